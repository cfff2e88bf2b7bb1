//! Record normalization: one raw websocket message into one `Record`.
//!
//! Inbound messages are JSON objects with a required `timestamp` key
//! (milliseconds since epoch) and arbitrary numeric fields, e.g.
//! `{"temperature_c": 54, "cpu_usage_percent": 51, "timestamp": 1737612795003}`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ColumnFilter;
use crate::{Result, StreamError};

/// One timestamped set of named numeric measurements. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    /// Milliseconds since epoch
    pub timestamp_ms: i64,
    /// Field name to value; only fields present in the message appear here
    pub fields: BTreeMap<String, f64>,
}

/// Parse one raw message into a `Record`, applying the column allow-list.
///
/// Fails with `Parse` when the payload is not a JSON object or the
/// `timestamp` key is missing or non-numeric, and with `Schema` when a
/// column named by the allow-list is absent from the message.
pub fn normalize(raw: &str, filter: &ColumnFilter) -> Result<Record> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| StreamError::Parse(format!("not valid JSON: {}", e)))?;
    let mut object = match value {
        Value::Object(map) => map,
        other => {
            return Err(StreamError::Parse(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };

    let timestamp_ms = match object.remove("timestamp") {
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|ms| ms as i64)
            .ok_or_else(|| StreamError::Parse("timestamp is not a finite number".into()))?,
        Some(other) => {
            return Err(StreamError::Parse(format!(
                "timestamp must be a number, got {}",
                type_name(&other)
            )))
        }
        None => return Err(StreamError::Parse("message has no 'timestamp' key".into())),
    };

    let mut fields = BTreeMap::new();
    match filter {
        ColumnFilter::All => {
            for (key, val) in object {
                match val.as_f64() {
                    Some(num) => {
                        fields.insert(key, num);
                    }
                    None => {
                        // Non-numeric values cannot be charted; drop them
                        debug!(column = %key, "skipping non-numeric field");
                    }
                }
            }
        }
        ColumnFilter::Only(columns) => {
            for column in columns {
                let val = object
                    .get(column)
                    .ok_or_else(|| StreamError::Schema(column.clone()))?;
                let num = val
                    .as_f64()
                    .ok_or_else(|| StreamError::Schema(column.clone()))?;
                fields.insert(column.clone(), num);
            }
        }
    }

    Ok(Record {
        timestamp_ms,
        fields,
    })
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
