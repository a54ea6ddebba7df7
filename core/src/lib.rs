//! Core types for MetaVault metadata collections.
//!
//! This crate defines the storage-independent half of MetaVault:
//!
//! - [`Value`] — a scalar attribute value (text, integer, or real).
//! - [`AttributeMap`] — a sparse per-row attribute map; a missing attribute
//!   is an absent entry, never an explicit null.
//! - [`Subset`] — an ordered, in-memory collection of keyed rows with union
//!   (`+`), difference (`-`), slicing, and random sampling.
//! - [`io`] — CSV/JSON/JSONL codecs chosen by file extension.
//!
//! The persistent side (datasets backed by SQLite tables) lives in the
//! `metavault-sqlite` crate and builds on these types.
//!
//! # Example
//!
//! ```
//! use metavault_core::{AttributeMap, Subset, Value};
//!
//! let mut row = AttributeMap::new();
//! row.insert("artist".into(), Value::from("Bounty Killer"));
//! row.insert("title".into(), Value::from("Riddim Killa"));
//!
//! let mut subset = Subset::new();
//! subset.insert("riddim.mp3", row);
//!
//! assert!(subset.contains("riddim.mp3"));
//! assert_eq!(subset.attributes(), ["artist", "title"]);
//! ```

mod error;
pub mod io;
mod subset;
mod value;

pub use error::{CoreError, Result};
pub use io::Format;
pub use subset::Subset;
pub use value::{AttributeMap, KEY_FIELD, Value};
