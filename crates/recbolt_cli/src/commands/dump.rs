//! Dump command implementation.

use super::open_store;
use ciborium::Value as Cbor;
use recbolt_core::{Identity, Options};
use recbolt_store::StoreResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};
use std::io::Write;

/// One stored record, as printed.
#[derive(Debug, Serialize)]
pub struct RecordDump {
    /// Bucket key (the record id).
    pub key: String,
    /// Decoded identity block, if the entry has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Identity>,
    /// User fields.
    pub record: Json,
}

/// Runs the dump command.
pub fn run(
    options: &Options,
    bucket: &str,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(options)?;

    let entries = store.view(|tx| -> StoreResult<Option<Vec<(String, Vec<u8>)>>> {
        Ok(tx.bucket(bucket.as_bytes()).map(|b| {
            b.iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), value.to_vec()))
                .collect()
        }))
    })?;
    store.close()?;

    let entries = entries.ok_or_else(|| format!("Bucket {bucket} not found"))?;

    let mut records = Vec::with_capacity(entries.len());
    for (key, bytes) in entries {
        records.push(dump_entry(key, &bytes)?);
    }

    writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
    Ok(())
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    model: Option<Identity>,
    record: Cbor,
}

/// Splits a stored envelope into its identity and user fields.
fn dump_entry(key: String, bytes: &[u8]) -> Result<RecordDump, Box<dyn std::error::Error>> {
    let envelope: Envelope = ciborium::de::from_reader(bytes)
        .map_err(|err| format!("entry {key} is not a record envelope: {err}"))?;

    Ok(RecordDump {
        key,
        model: envelope.model,
        record: to_json(envelope.record),
    })
}

/// Converts a CBOR value to JSON; byte strings become lowercase hex.
fn to_json(value: Cbor) -> Json {
    match value {
        Cbor::Null => Json::Null,
        Cbor::Bool(b) => Json::Bool(b),
        Cbor::Integer(i) => {
            let i = i128::from(i);
            if let Ok(n) = i64::try_from(i) {
                Json::Number(n.into())
            } else if let Ok(n) = u64::try_from(i) {
                Json::Number(n.into())
            } else {
                Json::String(i.to_string())
            }
        }
        Cbor::Float(f) => Number::from_f64(f).map_or(Json::Null, Json::Number),
        Cbor::Text(s) => Json::String(s),
        Cbor::Bytes(bytes) => Json::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
        Cbor::Array(items) => Json::Array(items.into_iter().map(to_json).collect()),
        Cbor::Map(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                let key = match k {
                    Cbor::Text(s) => s,
                    other => to_json(other).to_string(),
                };
                map.insert(key, to_json(v));
            }
            Json::Object(map)
        }
        Cbor::Tag(_, inner) => to_json(*inner),
        _ => Json::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recbolt_testkit::{TempRegistry, Widget};

    #[test]
    fn dumps_identity_and_fields() {
        let temp = TempRegistry::new();
        let widgets = temp.register::<Widget>().unwrap();
        let bolt = Widget::rec("bolt", 42);
        widgets.create(&bolt).unwrap();
        temp.close().unwrap();

        let mut out = Vec::new();
        run(&temp.open_options(), "Widget", None, &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let id = bolt.id().unwrap().to_string();
        assert_eq!(json[0]["key"], id.as_str());
        assert_eq!(json[0]["model"]["id"], id.as_str());
        assert_eq!(
            json[0]["model"]["created_at"],
            bolt.created_at().as_nanos()
        );
        assert_eq!(json[0]["record"]["name"], "bolt");
        assert_eq!(json[0]["record"]["price"], 42);
    }

    #[test]
    fn limit_caps_output() {
        let temp = TempRegistry::new();
        let widgets = temp.register::<Widget>().unwrap();
        for i in 0..5 {
            widgets.create(&Widget::rec("part", i)).unwrap();
        }
        temp.close().unwrap();

        let mut out = Vec::new();
        run(&temp.open_options(), "Widget", Some(2), &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[test]
    fn unknown_bucket() {
        let temp = TempRegistry::new();
        temp.close().unwrap();

        let mut out = Vec::new();
        let err = run(&temp.open_options(), "Nope", None, &mut out).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn non_text_values_convert() {
        let value = Cbor::Map(vec![
            (Cbor::Text("raw".into()), Cbor::Bytes(vec![0xab, 0x01])),
            (Cbor::Integer(7.into()), Cbor::Array(vec![Cbor::Bool(true), Cbor::Null])),
        ]);
        let json = to_json(value);
        assert_eq!(json["raw"], "ab01");
        assert_eq!(json["7"], serde_json::json!([true, null]));
    }
}
