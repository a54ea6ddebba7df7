//! Dictionary-style access to one dataset table.
//!
//! Provides [`Dataset`], the facade for get/set/delete by key, iteration,
//! attribute shape changes, search, slicing, random sampling, and bulk
//! import/export. Every operation translates to SQL against the database's
//! shared connection; subset-producing operations materialize their result
//! into an in-memory [`Subset`].
//!
//! # Example
//!
//! ```no_run
//! use metavault_sqlite::{AttributeMap, Database, Value};
//!
//! let db = Database::open("library.db").unwrap();
//! let tracks = db.create_dataset("tracks", &["artist", "title"]).unwrap();
//!
//! let mut row = AttributeMap::new();
//! row.insert("artist".into(), Value::from("Dog The Bounty Hunter"));
//! row.insert("title".into(), Value::from("Trashcore"));
//! tracks.set("ambient.mp3", &row).unwrap();
//!
//! for (key, attributes) in tracks.iter().unwrap() {
//!     println!("{key}: {attributes:?}");
//! }
//!
//! let hits = tracks.search(&[("artist", Value::from("Dog The Bounty Hunter"))]).unwrap();
//! hits.export_data("hits.jsonl").unwrap();
//! ```

use std::path::Path;

use metavault_core::{AttributeMap, Subset, Value, io};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::info;

use crate::convert;
use crate::database::Database;
use crate::error::{Result, VaultError};
use crate::schema::{self, KEY_COLUMN};

/// Facade over one dataset table, borrowing the owning [`Database`].
///
/// Keys are unique: one row per key, last write wins. `set` merges the given
/// attribute values into the row and auto-declares attributes the dataset
/// has not seen yet; removing an attribute is never implicit and requires
/// [`remove_attribute`](Self::remove_attribute).
pub struct Dataset<'a> {
    db: &'a Database,
    name: String,
}

impl<'a> Dataset<'a> {
    pub(crate) fn new(db: &'a Database, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    /// The dataset's name (and backing table name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered declared attribute names.
    pub fn attributes(&self) -> Result<Vec<String>> {
        schema::current_schema(self.db.conn(), &self.name)
    }

    /// Loads the attribute map for `key`.
    ///
    /// Attributes with no stored value are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyNotFound`] if the key is not present.
    pub fn get(&self, key: &str) -> Result<AttributeMap> {
        let attributes = self.attributes()?;
        let sql = format!(
            "SELECT {} FROM \"{}\" WHERE \"{KEY_COLUMN}\" = ?1",
            select_list(&attributes),
            self.name
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => convert::decode_row(row, &attributes),
            None => Err(VaultError::KeyNotFound {
                dataset: self.name.clone(),
                key: key.to_string(),
            }),
        }
    }

    /// Upserts a row: inserts it, or merges the given attribute values into
    /// the existing row with that key.
    ///
    /// Attributes not yet declared by the dataset are auto-declared, the
    /// construction shortcut of assigning a full map before declaring the
    /// schema. Values for attributes absent from `attributes` are left
    /// untouched on an existing row.
    pub fn set(&self, key: &str, attributes: &AttributeMap) -> Result<()> {
        self.db.begin_if_manual()?;
        for name in attributes.keys() {
            schema::add_attribute(self.db.conn(), &self.name, name)?;
        }

        if attributes.is_empty() {
            self.db.conn().execute(
                &format!(
                    "INSERT INTO \"{}\" (\"{KEY_COLUMN}\") VALUES (?1) \
                     ON CONFLICT(\"{KEY_COLUMN}\") DO NOTHING",
                    self.name
                ),
                [key],
            )?;
            return Ok(());
        }

        let columns: Vec<&str> = attributes.keys().map(String::as_str).collect();
        let column_list: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        let placeholders: Vec<String> =
            (0..columns.len()).map(|i| format!("?{}", i + 2)).collect();
        let updates: Vec<String> = columns
            .iter()
            .map(|c| format!("\"{c}\" = excluded.\"{c}\""))
            .collect();
        let sql = format!(
            "INSERT INTO \"{}\" (\"{KEY_COLUMN}\", {}) VALUES (?1, {}) \
             ON CONFLICT(\"{KEY_COLUMN}\") DO UPDATE SET {}",
            self.name,
            column_list.join(", "),
            placeholders.join(", "),
            updates.join(", ")
        );

        let mut params: Vec<SqlValue> = Vec::with_capacity(attributes.len() + 1);
        params.push(SqlValue::Text(key.to_string()));
        params.extend(attributes.values().map(convert::value_to_sql));
        self.db.conn().execute(&sql, params_from_iter(params))?;
        Ok(())
    }

    /// Removes the row for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyNotFound`] if the key is not present.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.db.begin_if_manual()?;
        let removed = self.db.conn().execute(
            &format!("DELETE FROM \"{}\" WHERE \"{KEY_COLUMN}\" = ?1", self.name),
            [key],
        )?;
        if removed == 0 {
            return Err(VaultError::KeyNotFound {
                dataset: self.name.clone(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Returns whether a row with `key` exists.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let count: i64 = self.db.conn().query_row(
            &format!(
                "SELECT COUNT(*) FROM \"{}\" WHERE \"{KEY_COLUMN}\" = ?1",
                self.name
            ),
            [key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Number of rows.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self.db.conn().query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Returns whether the dataset has no rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT \"{KEY_COLUMN}\" FROM \"{}\" ORDER BY rowid",
            self.name
        ))?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Iterates over `(key, attributes)` pairs in insertion order.
    ///
    /// Each call runs a fresh query, so iteration is restartable and sees
    /// the state at the time of the call.
    pub fn iter(&self) -> Result<impl Iterator<Item = (String, AttributeMap)>> {
        Ok(self.all()?.into_iter())
    }

    /// Materializes the whole dataset as an in-memory [`Subset`].
    pub fn all(&self) -> Result<Subset> {
        let attributes = self.attributes()?;
        let rows = self.query_rows(&attributes, "ORDER BY rowid", &[])?;
        Ok(subset_from(attributes, rows))
    }

    /// Declares a new attribute. Existing rows read back with it absent.
    /// Re-adding an existing attribute is a no-op, not an error.
    pub fn add_attribute(&self, name: &str) -> Result<()> {
        self.db.begin_if_manual()?;
        schema::add_attribute(self.db.conn(), &self.name, name)?;
        Ok(())
    }

    /// Drops an attribute and all its stored values. Destructive and always
    /// explicit.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::UnknownAttribute`] if the attribute is not
    /// declared.
    pub fn remove_attribute(&self, name: &str) -> Result<()> {
        self.db.begin_if_manual()?;
        schema::remove_attribute(self.db.conn(), &self.name, name)
    }

    /// Sets `attribute` to `new_value` on every row where it currently
    /// equals `old_value`, as one atomic statement.
    ///
    /// Returns the number of rows affected.
    pub fn replace_in_attribute(
        &self,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) -> Result<usize> {
        self.ensure_attribute(attribute)?;
        self.db.begin_if_manual()?;
        let changed = self.db.conn().execute(
            &format!(
                "UPDATE \"{}\" SET \"{attribute}\" = ?1 WHERE \"{attribute}\" = ?2",
                self.name
            ),
            params_from_iter([
                convert::value_to_sql(new_value),
                convert::value_to_sql(old_value),
            ]),
        )?;
        Ok(changed)
    }

    /// Rows matching all `(attribute, value)` equality criteria.
    ///
    /// An empty criteria list matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::UnknownAttribute`] for a criteria name the
    /// dataset does not declare.
    pub fn search(&self, criteria: &[(&str, Value)]) -> Result<Subset> {
        let attributes = self.attributes()?;
        let mut clauses = Vec::with_capacity(criteria.len());
        let mut params = Vec::with_capacity(criteria.len());
        for (position, (attribute, value)) in criteria.iter().enumerate() {
            if !attributes.iter().any(|a| a == attribute) {
                return Err(VaultError::UnknownAttribute {
                    dataset: self.name.clone(),
                    attribute: attribute.to_string(),
                });
            }
            clauses.push(format!("\"{attribute}\" = ?{}", position + 1));
            params.push(convert::value_to_sql(value));
        }

        let suffix = if clauses.is_empty() {
            "ORDER BY rowid".to_string()
        } else {
            format!("WHERE {} ORDER BY rowid", clauses.join(" AND "))
        };
        let rows = self.query_rows(&attributes, &suffix, &params)?;
        Ok(subset_from(attributes, rows))
    }

    /// Rows whose `attribute` contains `needle` as a substring.
    ///
    /// `%` and `_` in the needle are matched literally.
    pub fn search_contains(&self, attribute: &str, needle: &str) -> Result<Subset> {
        self.ensure_attribute(attribute)?;
        let attributes = self.attributes()?;
        let escaped = needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let suffix =
            format!("WHERE \"{attribute}\" LIKE ?1 ESCAPE '\\' ORDER BY rowid");
        let rows = self.query_rows(
            &attributes,
            &suffix,
            &[SqlValue::Text(format!("%{escaped}%"))],
        )?;
        Ok(subset_from(attributes, rows))
    }

    /// Rows whose key is in `keys`, preserving the order of `keys`.
    /// Unmatched keys are silently skipped.
    pub fn get_subset_by_key<S: AsRef<str>>(&self, keys: &[S]) -> Result<Subset> {
        let attributes = self.attributes()?;
        let sql = format!(
            "SELECT {} FROM \"{}\" WHERE \"{KEY_COLUMN}\" = ?1",
            select_list(&attributes),
            self.name
        );
        let mut stmt = self.db.conn().prepare(&sql)?;

        let mut subset = Subset::with_attributes(attributes.iter().cloned());
        for key in keys {
            let mut rows = stmt.query([key.as_ref()])?;
            if let Some(row) = rows.next()? {
                subset.insert(key.as_ref(), convert::decode_row(row, &attributes)?);
            }
        }
        Ok(subset)
    }

    /// A contiguous slice of up to `amount` rows from the dataset's
    /// insertion order, starting at offset `start`.
    ///
    /// With `reverse` the slice is counted from the end but the rows are
    /// still presented in forward order. Out-of-range slices truncate
    /// rather than fail.
    pub fn get_subset_by_amount(&self, amount: usize, start: usize, reverse: bool) -> Result<Subset> {
        let attributes = self.attributes()?;
        let order = if reverse { "DESC" } else { "ASC" };
        let suffix = format!("ORDER BY rowid {order} LIMIT ?1 OFFSET ?2");
        let mut rows = self.query_rows(
            &attributes,
            &suffix,
            &[SqlValue::from(amount as i64), SqlValue::from(start as i64)],
        )?;
        if reverse {
            rows.reverse();
        }
        Ok(subset_from(attributes, rows))
    }

    /// A uniform random sample of `amount` distinct rows.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InsufficientRows`] if `amount` exceeds the row
    /// count.
    pub fn get_subset_by_random(&self, amount: usize) -> Result<Subset> {
        let available = self.len()?;
        if amount > available {
            return Err(VaultError::InsufficientRows {
                requested: amount,
                available,
            });
        }
        let attributes = self.attributes()?;
        let rows = self.query_rows(
            &attributes,
            "ORDER BY RANDOM() LIMIT ?1",
            &[SqlValue::from(amount as i64)],
        )?;
        Ok(subset_from(attributes, rows))
    }

    /// Removes all rows, keeping the declared attributes.
    pub fn clear(&self) -> Result<()> {
        self.db.begin_if_manual()?;
        self.db
            .conn()
            .execute(&format!("DELETE FROM \"{}\"", self.name), [])?;
        Ok(())
    }

    /// Inserts many rows at once inside one savepoint, replacing existing
    /// rows wholesale on key collision.
    ///
    /// New attribute names from the subset are auto-declared first.
    pub fn batch_insert(&self, entries: &Subset) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.db.with_savepoint(|| {
            for name in entries.attributes() {
                schema::add_attribute(self.db.conn(), &self.name, name)?;
            }
            let attributes = self.attributes()?;
            let column_list: Vec<String> = attributes
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect();
            let placeholders: Vec<String> = (0..attributes.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            let sql = if attributes.is_empty() {
                format!(
                    "INSERT OR REPLACE INTO \"{}\" (\"{KEY_COLUMN}\") VALUES (?1)",
                    self.name
                )
            } else {
                format!(
                    "INSERT OR REPLACE INTO \"{}\" (\"{KEY_COLUMN}\", {}) VALUES (?1, {})",
                    self.name,
                    column_list.join(", "),
                    placeholders.join(", ")
                )
            };

            let mut stmt = self.db.conn().prepare(&sql)?;
            for (key, map) in entries.iter() {
                let mut params: Vec<SqlValue> = Vec::with_capacity(attributes.len() + 1);
                params.push(SqlValue::Text(key.to_string()));
                params.extend(convert::encode_row(&self.name, map, &attributes)?);
                stmt.execute(params_from_iter(params))?;
            }
            Ok(())
        })
    }

    /// Serializes all rows to a CSV, JSON, or JSONL file chosen by
    /// extension. The CSV column order is the declared schema order with
    /// the key column first.
    pub fn export_data(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let subset = self.all()?;
        subset.export_data(path)?;
        info!(
            dataset = %self.name,
            rows = subset.len(),
            path = %path.display(),
            "exported dataset"
        );
        Ok(())
    }

    /// Reads a CSV, JSON, or JSONL file and upserts each record by key,
    /// auto-declaring any attribute the dataset has not seen yet.
    ///
    /// Returns the number of records imported.
    pub fn import_data(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.import(path.as_ref(), false)
    }

    /// Like [`import_data`](Self::import_data), but clears the dataset
    /// first so it ends up holding exactly the file's records.
    pub fn import_data_replace(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.import(path.as_ref(), true)
    }

    fn import(&self, path: &Path, replace: bool) -> Result<usize> {
        let records = io::read_records(path)?;
        self.db.with_savepoint(|| {
            if replace {
                self.db
                    .conn()
                    .execute(&format!("DELETE FROM \"{}\"", self.name), [])?;
            }
            for (key, map) in &records {
                self.set(key, map)?;
            }
            Ok(())
        })?;
        info!(
            dataset = %self.name,
            rows = records.len(),
            path = %path.display(),
            "imported dataset"
        );
        Ok(records.len())
    }

    fn ensure_attribute(&self, attribute: &str) -> Result<()> {
        if !self.attributes()?.iter().any(|a| a == attribute) {
            return Err(VaultError::UnknownAttribute {
                dataset: self.name.clone(),
                attribute: attribute.to_string(),
            });
        }
        Ok(())
    }

    fn query_rows(
        &self,
        attributes: &[String],
        suffix: &str,
        params: &[SqlValue],
    ) -> Result<Vec<(String, AttributeMap)>> {
        let sql = format!(
            "SELECT {} FROM \"{}\" {suffix}",
            select_list(attributes),
            self.name
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            out.push((key, convert::decode_row(row, attributes)?));
        }
        Ok(out)
    }
}

/// Quoted column list: the key column first, then the attributes in
/// declared order.
fn select_list(attributes: &[String]) -> String {
    let mut list = format!("\"{KEY_COLUMN}\"");
    for attribute in attributes {
        list.push_str(&format!(", \"{attribute}\""));
    }
    list
}

fn subset_from(attributes: Vec<String>, rows: Vec<(String, AttributeMap)>) -> Subset {
    let mut subset = Subset::with_attributes(attributes);
    for (key, map) in rows {
        subset.insert(key, map);
    }
    subset
}
