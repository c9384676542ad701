//! CLI command implementations.

pub mod dump;
pub mod inspect;

use recbolt_core::Options;
use recbolt_store::Store;
use tracing::debug;

/// Opens the store named by `options`, refusing to create a new file.
pub fn open_store(options: &Options) -> Result<Store, Box<dyn std::error::Error>> {
    if !options.path().exists() {
        return Err(format!("No store found at {}", options.path().display()).into());
    }
    debug!(store = %options, "opening store");
    Ok(Store::open(options.path(), options.store_options())?)
}
