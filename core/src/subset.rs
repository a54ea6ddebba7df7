//! In-memory, ordered collections of keyed attribute rows.
//!
//! A [`Subset`] is the transient result of filtering, slicing, or sampling a
//! persistent dataset. It preserves insertion order, tracks its own ordered
//! attribute list, and supports set algebra: union (`+`, right operand wins
//! on key collision) and difference (`-`). Subsets can be re-filtered,
//! re-sampled, exported to a file, or persisted back into a database.

use std::collections::HashMap;
use std::ops::{Add, Sub};
use std::path::Path;

use rand::seq::index;

use crate::error::{CoreError, Result};
use crate::io;
use crate::value::AttributeMap;

/// An ordered, in-memory collection of `(key, attributes)` rows.
///
/// # Examples
///
/// ```
/// use metavault_core::{AttributeMap, Subset, Value};
///
/// let mut subset = Subset::new();
/// let mut row = AttributeMap::new();
/// row.insert("artist".into(), Value::from("Bounty Killer"));
/// subset.insert("riddim.mp3", row);
///
/// assert_eq!(subset.len(), 1);
/// assert_eq!(subset.attributes(), ["artist"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Subset {
    attributes: Vec<String>,
    entries: Vec<(String, AttributeMap)>,
    index: HashMap<String, usize>,
}

impl Subset {
    /// Creates an empty subset with no declared attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty subset with a pre-declared attribute order.
    ///
    /// Rows inserted later may still introduce new attributes, which are
    /// appended after the declared ones.
    pub fn with_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut subset = Self::new();
        for name in attributes {
            subset.declare_attribute(name.into());
        }
        subset
    }

    fn declare_attribute(&mut self, name: String) {
        if !self.attributes.contains(&name) {
            self.attributes.push(name);
        }
    }

    /// Ordered attribute names covered by this subset.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Inserts or replaces a row, returning the previous attributes if the
    /// key was already present. Replacement keeps the row's original
    /// position; new attribute names are appended to the attribute order.
    pub fn insert(&mut self, key: impl Into<String>, attributes: AttributeMap) -> Option<AttributeMap> {
        let key = key.into();
        for name in attributes.keys() {
            if !self.attributes.iter().any(|a| a == name) {
                self.attributes.push(name.clone());
            }
        }
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, attributes)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, attributes));
                None
            }
        }
    }

    /// Looks up a row by key.
    pub fn get(&self, key: &str) -> Option<&AttributeMap> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    /// Removes a row by key, returning its attributes if present.
    pub fn remove(&mut self, key: &str) -> Option<AttributeMap> {
        let pos = self.index.remove(key)?;
        let (_, attributes) = self.entries.remove(pos);
        for entry in self.index.values_mut() {
            if *entry > pos {
                *entry -= 1;
            }
        }
        Some(attributes)
    }

    /// Removes every row whose key appears in `keys`. Unmatched keys are
    /// silently skipped.
    pub fn remove_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.remove(key.as_ref());
        }
    }

    /// Returns whether the subset contains a row for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the subset has no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeMap)> {
        self.entries.iter().map(|(key, map)| (key.as_str(), map))
    }

    /// Merges another subset into this one.
    ///
    /// Rows from `other` win on key collision; `other`'s new attribute
    /// names are appended to this subset's attribute order.
    pub fn merge(&mut self, other: Subset) {
        for name in other.attributes {
            self.declare_attribute(name);
        }
        for (key, attributes) in other.entries {
            self.insert(key, attributes);
        }
    }

    /// Rows whose key is in `keys`, preserving the order of `keys`.
    /// Unmatched keys are silently skipped.
    pub fn get_subset_by_key<I, S>(&self, keys: I) -> Subset
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut subset = Subset::with_attributes(self.attributes.clone());
        for key in keys {
            if let Some(attributes) = self.get(key.as_ref()) {
                subset.insert(key.as_ref(), attributes.clone());
            }
        }
        subset
    }

    /// A contiguous slice of up to `amount` rows starting at `start`.
    ///
    /// With `reverse` the slice is counted from the end of the collection
    /// but the rows are still presented in forward order. Out-of-range
    /// slices truncate rather than fail.
    pub fn get_subset_by_amount(&self, amount: usize, start: usize, reverse: bool) -> Subset {
        let len = self.entries.len();
        let picked: Vec<&(String, AttributeMap)> = if reverse {
            let mut rows: Vec<_> = self.entries.iter().rev().skip(start).take(amount).collect();
            rows.reverse();
            rows
        } else {
            self.entries.iter().skip(start.min(len)).take(amount).collect()
        };

        let mut subset = Subset::with_attributes(self.attributes.clone());
        for (key, attributes) in picked {
            subset.insert(key.clone(), attributes.clone());
        }
        subset
    }

    /// A uniform random sample of `amount` distinct rows, in dataset order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InsufficientRows`] if `amount` exceeds the
    /// number of rows.
    pub fn get_subset_by_random(&self, amount: usize) -> Result<Subset> {
        if amount > self.entries.len() {
            return Err(CoreError::InsufficientRows {
                requested: amount,
                available: self.entries.len(),
            });
        }
        let mut picked: Vec<usize> =
            index::sample(&mut rand::thread_rng(), self.entries.len(), amount).into_vec();
        picked.sort_unstable();

        let mut subset = Subset::with_attributes(self.attributes.clone());
        for pos in picked {
            let (key, attributes) = &self.entries[pos];
            subset.insert(key.clone(), attributes.clone());
        }
        Ok(subset)
    }

    /// The first `amount` rows.
    pub fn truncate(&self, amount: usize) -> Subset {
        self.get_subset_by_amount(amount, 0, false)
    }

    /// Serializes all rows to a CSV, JSON, or JSONL file chosen by
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedFormat`] for an unknown extension,
    /// or an I/O / serialization error from the underlying codec.
    pub fn export_data(&self, path: impl AsRef<Path>) -> Result<()> {
        io::write_records(path.as_ref(), &self.attributes, self.iter())
    }
}

impl PartialEq for Subset {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes && self.entries == other.entries
    }
}

impl Add for Subset {
    type Output = Subset;

    /// Union: rows merged, the right operand wins on key collision.
    fn add(mut self, rhs: Subset) -> Subset {
        self.merge(rhs);
        self
    }
}

impl Sub for Subset {
    type Output = Subset;

    /// Difference: removes every key of the right operand from the left.
    fn sub(mut self, rhs: Subset) -> Subset {
        let keys: Vec<String> = rhs.keys().map(str::to_string).collect();
        self.remove_keys(keys);
        self
    }
}

impl IntoIterator for Subset {
    type Item = (String, AttributeMap);
    type IntoIter = std::vec::IntoIter<(String, AttributeMap)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, AttributeMap)> for Subset {
    fn from_iter<I: IntoIterator<Item = (String, AttributeMap)>>(iter: I) -> Self {
        let mut subset = Subset::new();
        for (key, attributes) in iter {
            subset.insert(key, attributes);
        }
        subset
    }
}
