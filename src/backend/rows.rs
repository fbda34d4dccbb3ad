//! Result rows
//!
//! Raw-data rows cross three backends and one JSON wire format, with mixed
//! numeric types showing up for the same field (`"1723594001000"` vs
//! `1723594001000` vs `1.723594001e12`). Rows are therefore a semantic map
//! from field name to a small tagged variant instead of an untyped JSON
//! blob.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A single field value in a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// JSON null
    Null,
    /// Integral number
    Integer(i64),
    /// Floating-point number
    Float(f64),
    /// String value
    String(String),
}

impl FieldValue {
    /// Convert an arbitrary JSON value, rendering anything outside the
    /// supported variants (bools, arrays, objects) as its JSON text.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => FieldValue::String(s),
            other => FieldValue::String(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, ""),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// A result row: field name to value, with stable field order
pub type Row = BTreeMap<String, FieldValue>;

/// Build a [`Row`] from a decoded JSON object, flattening non-scalar values
pub fn row_from_object(object: serde_json::Map<String, Value>) -> Row {
    object
        .into_iter()
        .map(|(k, v)| (k, FieldValue::from_json(v)))
        .collect()
}
