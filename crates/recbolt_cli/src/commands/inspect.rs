//! Inspect command implementation.

use super::open_store;
use recbolt_core::Options;
use recbolt_store::StoreResult;
use serde::Serialize;
use std::io::Write;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store file path.
    pub path: String,
    /// Store name.
    pub name: String,
    /// Commit log size in bytes.
    pub log_size: u64,
    /// Per-bucket statistics, by name.
    pub buckets: Vec<BucketStats>,
}

/// Statistics for a single bucket.
#[derive(Debug, Serialize)]
pub struct BucketStats {
    /// Bucket name.
    pub name: String,
    /// Number of entries.
    pub entries: usize,
    /// Total size of all values in bytes.
    pub data_size: usize,
}

/// Runs the inspect command.
pub fn run(
    options: &Options,
    format: &str,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(options)?;

    let buckets = store.view(|tx| -> StoreResult<Vec<BucketStats>> {
        Ok(tx
            .bucket_names()
            .into_iter()
            .filter_map(|name| tx.bucket(name))
            .map(|bucket| BucketStats {
                name: String::from_utf8_lossy(bucket.name()).into_owned(),
                entries: bucket.len(),
                data_size: bucket.iter().map(|(_, value)| value.len()).sum(),
            })
            .collect())
    })?;

    let result = InspectResult {
        path: options.path().display().to_string(),
        name: options.name(),
        log_size: store.log_size()?,
        buckets,
    };
    store.close()?;

    match format {
        "json" => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        _ => print_text_output(&result, out)?,
    }

    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Store: {} ({})", result.name, result.path)?;
    writeln!(out, "Log size: {} bytes", result.log_size)?;
    writeln!(out)?;

    if result.buckets.is_empty() {
        writeln!(out, "No buckets")?;
        return Ok(());
    }

    writeln!(out, "{:<32} {:>10} {:>12}", "Bucket", "Entries", "Bytes")?;
    for bucket in &result.buckets {
        writeln!(
            out,
            "{:<32} {:>10} {:>12}",
            bucket.name, bucket.entries, bucket.data_size
        )?;
    }
    Ok(())
}
