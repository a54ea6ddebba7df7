//! Conversion between attribute maps and SQLite rows.
//!
//! Encoding maps each declared attribute to its value or NULL when absent;
//! decoding produces a map containing only the attributes whose stored value
//! is non-null. Together the two directions give the round-trip law: what
//! you set (restricted to declared attributes) is what you get.

use metavault_core::{AttributeMap, Value};
use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::error::{Result, VaultError};

/// Converts an attribute value into a SQLite value.
pub(crate) fn value_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
    }
}

/// Converts a stored SQLite value back into an attribute value.
///
/// NULL maps to `None`. BLOBs are outside the scalar data model and fail
/// with [`VaultError::Conversion`].
pub(crate) fn sql_to_value(value: ValueRef<'_>) -> Result<Option<Value>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(Value::Integer(i))),
        ValueRef::Real(f) => Ok(Some(Value::Real(f))),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| VaultError::Conversion(format!("invalid utf-8 text: {e}")))?;
            Ok(Some(Value::Text(text.to_string())))
        }
        ValueRef::Blob(_) => Err(VaultError::Conversion(
            "blob values are not part of the attribute data model".to_string(),
        )),
    }
}

/// Encodes an attribute map into SQLite values in declared schema order,
/// NULL for absent attributes.
///
/// # Errors
///
/// Returns [`VaultError::UnknownAttribute`] if the map carries an attribute
/// outside the schema; callers must grow the schema first.
pub(crate) fn encode_row(
    dataset: &str,
    attributes: &AttributeMap,
    schema: &[String],
) -> Result<Vec<SqlValue>> {
    for name in attributes.keys() {
        if !schema.iter().any(|a| a == name) {
            return Err(VaultError::UnknownAttribute {
                dataset: dataset.to_string(),
                attribute: name.clone(),
            });
        }
    }
    Ok(schema
        .iter()
        .map(|name| attributes.get(name).map(value_to_sql).unwrap_or(SqlValue::Null))
        .collect())
}

/// Decodes a queried row into an attribute map, skipping NULL columns.
///
/// Expects the row's columns to be the key column followed by the schema's
/// attributes in order, as produced by the dataset's SELECT statements.
pub(crate) fn decode_row(row: &Row<'_>, schema: &[String]) -> Result<AttributeMap> {
    let mut map = AttributeMap::new();
    for (offset, name) in schema.iter().enumerate() {
        if let Some(value) = sql_to_value(row.get_ref(offset + 1)?)? {
            map.insert(name.clone(), value);
        }
    }
    Ok(map)
}
