//! Conversion between snapshot values and `serde_json` values.
//!
//! Integral floats cross over as JSON integers, matching how the structural
//! hash and [`Value`] equality already treat them. Non-finite floats have no
//! JSON form and become `null`.

use risusave_codec::Value;
use serde_json::{Map, Number};

/// Largest float magnitude that converts to an `i64` exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Converts a snapshot value into a JSON value.
pub(crate) fn to_json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::Number(Number::from(*n)),
        Value::Float(f) => float_to_json(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(to_json_value).collect())
        }
        Value::Map(pairs) => serde_json::Value::Object(
            pairs
                .iter()
                .map(|(key, value)| (key.clone(), to_json_value(value)))
                .collect::<Map<String, serde_json::Value>>(),
        ),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_json(f: f64) -> serde_json::Value {
    if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER {
        return serde_json::Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Converts a JSON value into a snapshot value.
pub(crate) fn from_json_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json_value).collect())
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(key, value)| (key, from_json_value(value)))
                .collect(),
        ),
    }
}
