//! SQLite storage backend for MetaVault metadata datasets.
//!
//! MetaVault stores metadata associated with (media) files: each named
//! dataset behaves like a dictionary mapping a filename key to a sparse
//! attribute map, persisted in one SQLite table per dataset. Attributes are
//! declared per dataset and can be added or removed at runtime without
//! losing data for the retained columns.
//!
//! The crate is organized into four modules:
//!
//! - **`schema`** — live table-shape management (declare/add/remove/list)
//! - **`convert`** — attribute map ↔ SQL row transformations
//! - **`dataset`** — the dictionary-style facade over one table
//! - **`database`** — connection ownership, dataset registry, transactions
//!
//! # Quick start
//!
//! ```no_run
//! use metavault_sqlite::{AttributeMap, Database, Value};
//!
//! let db = Database::open("library.db").unwrap();
//! let tracks = db.create_dataset("tracks", &["artist", "title"]).unwrap();
//!
//! let mut row = AttributeMap::new();
//! row.insert("artist".into(), Value::from("Bounty Killer"));
//! row.insert("title".into(), Value::from("Riddim Killa"));
//! tracks.set("riddim.mp3", &row).unwrap();
//!
//! let loaded = tracks.get("riddim.mp3").unwrap();
//! assert_eq!(loaded, row);
//!
//! // Subsets: search, slice, sample, then combine or persist.
//! let killers = tracks.search_contains("artist", "Bounty").unwrap();
//! let first_ten = tracks.get_subset_by_amount(10, 0, false).unwrap();
//! db.insert_dataset("shortlist", &(killers + first_ten)).unwrap();
//!
//! db.close().unwrap();
//! ```
//!
//! # Bulk loading
//!
//! Open with manual commit to batch many writes into one transaction:
//!
//! ```no_run
//! use metavault_sqlite::{AttributeMap, Database};
//!
//! let db = Database::open_with("library.db", true).unwrap();
//! let tracks = db.create_dataset("tracks", &["artist"]).unwrap();
//! for i in 0..10_000 {
//!     tracks.set(&format!("take_{i}.wav"), &AttributeMap::new()).unwrap();
//! }
//! db.commit().unwrap();
//! ```
//!
//! # Concurrency
//!
//! A [`Database`] is a single-threaded, synchronous resource. It cannot be
//! shared across threads; callers needing concurrent access must serialize
//! it themselves.

mod convert;
mod database;
mod dataset;
mod error;
mod schema;

pub use database::Database;
pub use dataset::Dataset;
pub use error::{Result, VaultError};

pub use metavault_core::{AttributeMap, CoreError, Format, Subset, Value};
