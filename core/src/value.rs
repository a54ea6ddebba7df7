//! Scalar attribute values and the per-row attribute map.
//!
//! The data model is deliberately small: an attribute value is a string, an
//! integer, or a real; a missing attribute is modeled as absence from the
//! map, never as an explicit null. The types serialize with [`serde`] and
//! round-trip through JSON, CSV, and SQLite storage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Name of the key field used in exported files and storage tables.
///
/// Every record is keyed by a filename; this constant names the CSV header
/// column, the JSONL key field, and the SQLite primary key column.
pub const KEY_FIELD: &str = "filename";

/// A single attribute value.
///
/// # Examples
///
/// ```
/// use metavault_core::Value;
///
/// let artist = Value::from("Bounty Killer");
/// assert_eq!(artist.as_str(), Some("Bounty Killer"));
///
/// let bpm = Value::from(174);
/// assert_eq!(bpm.to_string(), "174");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Real(f64),
    /// Text value.
    Text(String),
}

/// Sparse attribute map for one row, keyed by attribute name.
///
/// A row need not define every attribute its dataset declares; undefined
/// attributes are simply absent from the map.
pub type AttributeMap = BTreeMap<String, Value>;

impl Value {
    /// Returns the text content if this is a [`Value::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content if this is a [`Value::Integer`].
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the real content if this is a [`Value::Real`].
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Infers a value from raw text, as read from a CSV cell.
    ///
    /// Tries integer first, then real, falling back to text. This mirrors
    /// the lossy-by-design CSV model: a text value that looks numeric does
    /// not survive a CSV round-trip typed as text.
    pub fn infer(text: &str) -> Value {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            if f.is_finite() {
                return Value::Real(f);
            }
        }
        Value::Text(text.to_string())
    }

    /// Converts a JSON value into an attribute value.
    ///
    /// JSON `null` maps to `None` (the attribute is absent). Booleans,
    /// arrays, and objects are outside the scalar data model and fail with
    /// [`CoreError::Import`].
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Value>> {
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => Ok(Some(Value::Text(s.clone()))),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Some(Value::Integer(i)))
                } else if let Some(f) = n.as_f64() {
                    Ok(Some(Value::Real(f)))
                } else {
                    Err(CoreError::Import(format!("number out of range: {n}")))
                }
            }
            other => Err(CoreError::Import(format!(
                "unsupported value {other}: expected string, number, or null"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            // {:?} keeps a trailing ".0" so reals stay reals through CSV
            Value::Real(r) => write!(f, "{r:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Value::from(*f),
        }
    }
}
