//! JSON config loading
//!
//! Accepted shape: a top-level object whose members are strings, numbers,
//! booleans (stored as int64 0/1) or nested objects (nested configs).
//! Arrays and nulls are rejected.

use serde_json::{Map, Value};

use crate::error::{KvError, Result};

use super::Config;

/// Parse a JSON document into a config
pub fn parse(text: &str) -> Result<Config> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| KvError::ConfigParsing(format!("Invalid JSON: {e}")))?;

    match document {
        Value::Object(members) => from_members(members),
        other => Err(KvError::ConfigParsing(format!(
            "Config root must be an object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn from_members(members: Map<String, Value>) -> Result<Config> {
    let mut config = Config::new();

    for (key, value) in members {
        match value {
            Value::String(s) => config.put_string(key, s),
            Value::Bool(b) => config.put_int64(key, i64::from(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    config.put_int64(key, i);
                } else if let Some(u) = n.as_u64() {
                    config.put_uint64(key, u);
                } else if let Some(d) = n.as_f64() {
                    config.put_double(key, d);
                } else {
                    return Err(KvError::ConfigParsing(format!(
                        "Unrepresentable number for '{key}'"
                    )));
                }
            }
            Value::Object(nested) => {
                let sub = from_members(nested).map_err(|e| {
                    KvError::ConfigParsing(format!("Cannot parse subconfig '{key}': {e}"))
                })?;
                config.put_config(key, sub);
            }
            other => {
                return Err(KvError::ConfigParsing(format!(
                    "Unsupported data type in JSON string: {}",
                    json_type_name(&other)
                )))
            }
        }
    }

    Ok(config)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}
