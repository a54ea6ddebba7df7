//! Schema management for dataset tables.
//!
//! Each dataset is backed by one SQLite table named after it, with a
//! `filename TEXT PRIMARY KEY` key column and one column per declared
//! attribute. The declared attribute list is the table's column list, read
//! back through `PRAGMA table_info`, so the schema is always live table
//! metadata rather than a separately maintained side structure.
//!
//! Attribute columns are declared without a type affinity so that integer,
//! real, and text values round-trip unchanged.
//!
//! Dataset and attribute names must match `[A-Za-z_][A-Za-z0-9_]*`; they are
//! validated before being interpolated into any statement.

use rusqlite::Connection;

use crate::error::{Result, VaultError};

/// Primary key column of every dataset table.
pub(crate) const KEY_COLUMN: &str = metavault_core::KEY_FIELD;

/// Validates a bare SQL identifier.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidName(name.to_string()))
    }
}

/// Validates a dataset name. The `sqlite_` prefix is reserved by SQLite.
pub(crate) fn validate_dataset_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name.starts_with("sqlite_") {
        return Err(VaultError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Validates an attribute name. The key column name is reserved.
pub(crate) fn validate_attribute_name(name: &str) -> Result<()> {
    validate_name(name)?;
    if name == KEY_COLUMN {
        return Err(VaultError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Returns whether a dataset table exists.
pub(crate) fn table_exists(conn: &Connection, dataset: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [dataset],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Lists all dataset tables, excluding SQLite's internal ones.
pub(crate) fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Creates a dataset table with the given attribute columns.
pub(crate) fn create_table<S: AsRef<str>>(
    conn: &Connection,
    dataset: &str,
    attributes: &[S],
) -> Result<()> {
    validate_dataset_name(dataset)?;
    let mut columns = format!("\"{KEY_COLUMN}\" TEXT PRIMARY KEY");
    for attribute in attributes {
        let attribute = attribute.as_ref();
        validate_attribute_name(attribute)?;
        columns.push_str(&format!(", \"{attribute}\""));
    }
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{dataset}\" ({columns});"
    ))?;
    tracing::debug!(dataset, attributes = attributes.len(), "created dataset table");
    Ok(())
}

/// Declares a dataset: creates the table if absent, otherwise verifies that
/// the stored attribute set matches the requested one.
///
/// # Errors
///
/// Returns [`VaultError::Schema`] if the dataset exists with a different
/// attribute set. Attribute order is not significant for this check.
pub(crate) fn declare<S: AsRef<str>>(
    conn: &Connection,
    dataset: &str,
    attributes: &[S],
) -> Result<()> {
    validate_dataset_name(dataset)?;
    if !table_exists(conn, dataset)? {
        return create_table(conn, dataset, attributes);
    }

    let mut stored = current_schema(conn, dataset)?;
    let mut requested: Vec<String> = attributes
        .iter()
        .map(|a| a.as_ref().to_string())
        .collect();
    stored.sort();
    requested.sort();
    if stored != requested {
        return Err(VaultError::Schema(format!(
            "dataset '{dataset}' already declared with attributes [{}], requested [{}]",
            stored.join(", "),
            requested.join(", ")
        )));
    }
    Ok(())
}

/// Returns the ordered declared attribute names, excluding the key column.
pub(crate) fn current_schema(conn: &Connection, dataset: &str) -> Result<Vec<String>> {
    validate_dataset_name(dataset)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{dataset}\")"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns.into_iter().filter(|c| c != KEY_COLUMN).collect())
}

/// Adds a nullable attribute column. Existing rows read back with the
/// attribute absent. Idempotent: re-adding is a no-op, not an error.
///
/// Returns whether the column was actually added.
pub(crate) fn add_attribute(conn: &Connection, dataset: &str, attribute: &str) -> Result<bool> {
    validate_attribute_name(attribute)?;
    let current = current_schema(conn, dataset)?;
    if current.iter().any(|a| a == attribute) {
        return Ok(false);
    }
    conn.execute_batch(&format!(
        "ALTER TABLE \"{dataset}\" ADD COLUMN \"{attribute}\";"
    ))?;
    tracing::debug!(dataset, attribute, "added attribute column");
    Ok(true)
}

/// Drops an attribute column. Destructive: stored values for the attribute
/// are lost.
///
/// # Errors
///
/// Returns [`VaultError::UnknownAttribute`] if the attribute is not declared.
pub(crate) fn remove_attribute(conn: &Connection, dataset: &str, attribute: &str) -> Result<()> {
    validate_attribute_name(attribute)?;
    let current = current_schema(conn, dataset)?;
    if !current.iter().any(|a| a == attribute) {
        return Err(VaultError::UnknownAttribute {
            dataset: dataset.to_string(),
            attribute: attribute.to_string(),
        });
    }
    conn.execute_batch(&format!(
        "ALTER TABLE \"{dataset}\" DROP COLUMN \"{attribute}\";"
    ))?;
    tracing::debug!(dataset, attribute, "dropped attribute column");
    Ok(())
}
