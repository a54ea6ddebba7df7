//! Database handle: connection ownership, dataset registry, transactions.
//!
//! A [`Database`] owns one SQLite connection over one storage file and hands
//! out [`Dataset`] facades borrowing it. It is a strictly single-threaded,
//! synchronous resource: the handle is not shareable across threads, and
//! callers that need concurrent access must serialize it themselves.
//!
//! # Durability modes
//!
//! By default every write is durable as soon as the statement completes
//! (SQLite autocommit). In manual-commit mode a transaction is opened lazily
//! before the first write and everything batches until
//! [`commit`](Database::commit), trading durability-per-write for throughput
//! on bulk loads.
//!
//! # Checkpoints
//!
//! [`begin_transaction`](Database::begin_transaction) marks a restore point
//! for risky multi-step work; [`rollback`](Database::rollback) restores to
//! it and fails with [`VaultError::NoCheckpoint`] when none is active.

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{Result, VaultError};
use crate::schema;

/// A metadata store backed by a single SQLite file.
///
/// # Examples
///
/// ```no_run
/// use metavault_sqlite::{AttributeMap, Database, Value};
///
/// let db = Database::open("library.db").unwrap();
/// let tracks = db.create_dataset("tracks", &["artist", "title"]).unwrap();
///
/// let mut row = AttributeMap::new();
/// row.insert("artist".into(), Value::from("Bounty Killer"));
/// tracks.set("riddim.mp3", &row).unwrap();
///
/// db.close().unwrap();
/// ```
pub struct Database {
    conn: Connection,
    manual_commit: bool,
    checkpoint: Cell<bool>,
}

impl Database {
    /// Opens (or creates) the database file with per-statement durability.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, false)
    }

    /// Opens (or creates) the database file, choosing the durability mode.
    ///
    /// With `manual_commit` set, writes batch into one open transaction and
    /// become durable only on [`commit`](Self::commit).
    pub fn open_with(path: impl AsRef<Path>, manual_commit: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, manual_commit)
    }

    /// Opens a transient in-memory database. Useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, false)
    }

    fn from_connection(conn: Connection, manual_commit: bool) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            manual_commit,
            checkpoint: Cell::new(false),
        })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Returns whether the handle batches writes until an explicit commit.
    pub fn is_manual_commit(&self) -> bool {
        self.manual_commit
    }

    /// Names of all datasets in the database, sorted.
    pub fn datasets(&self) -> Result<Vec<String>> {
        schema::list_tables(&self.conn)
    }

    /// Returns whether a dataset with the given name exists.
    pub fn contains_dataset(&self, name: &str) -> Result<bool> {
        schema::validate_dataset_name(name)?;
        schema::table_exists(&self.conn, name)
    }

    /// Creates a new dataset with the given declared attributes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DatasetExists`] if the name is taken, or
    /// [`VaultError::InvalidName`] for a malformed dataset or attribute name.
    pub fn create_dataset<S: AsRef<str>>(&self, name: &str, attributes: &[S]) -> Result<Dataset<'_>> {
        schema::validate_dataset_name(name)?;
        if schema::table_exists(&self.conn, name)? {
            return Err(VaultError::DatasetExists(name.to_string()));
        }
        self.begin_if_manual()?;
        schema::create_table(&self.conn, name, attributes)?;
        Ok(Dataset::new(self, name))
    }

    /// Declares a dataset: creates it if absent, otherwise verifies that the
    /// stored attribute set matches.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Schema`] if the dataset exists with a different
    /// attribute set.
    pub fn declare_dataset<S: AsRef<str>>(&self, name: &str, attributes: &[S]) -> Result<Dataset<'_>> {
        self.begin_if_manual()?;
        schema::declare(&self.conn, name, attributes)?;
        Ok(Dataset::new(self, name))
    }

    /// Returns the facade for an existing dataset.
    ///
    /// Datasets are never created lazily here; use
    /// [`create_dataset`](Self::create_dataset) or
    /// [`insert_dataset`](Self::insert_dataset) to make one.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DatasetNotFound`] if no dataset has this name.
    pub fn dataset(&self, name: &str) -> Result<Dataset<'_>> {
        if !self.contains_dataset(name)? {
            return Err(VaultError::DatasetNotFound(name.to_string()));
        }
        Ok(Dataset::new(self, name))
    }

    /// Drops a dataset and all its rows. Removing an absent dataset is a
    /// no-op.
    pub fn remove_dataset(&self, name: &str) -> Result<()> {
        schema::validate_dataset_name(name)?;
        self.begin_if_manual()?;
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\";"))?;
        debug!(dataset = name, "removed dataset");
        Ok(())
    }

    /// Persists an in-memory subset as a dataset, replacing any existing
    /// dataset of that name.
    pub fn insert_dataset(&self, name: &str, subset: &metavault_core::Subset) -> Result<Dataset<'_>> {
        schema::validate_dataset_name(name)?;
        self.with_savepoint(|| {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\";"))?;
            schema::create_table(&self.conn, name, subset.attributes())?;
            let dataset = Dataset::new(self, name);
            dataset.batch_insert(subset)?;
            Ok(())
        })?;
        debug!(dataset = name, rows = subset.len(), "persisted subset as dataset");
        Ok(Dataset::new(self, name))
    }

    /// Marks a transaction checkpoint for risky multi-step work.
    ///
    /// Any writes batched since the last commit are flushed first, so the
    /// checkpoint covers only operations made after this call. Restore with
    /// [`rollback`](Self::rollback), or keep the changes with
    /// [`commit`](Self::commit).
    pub fn begin_transaction(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT;")?;
        }
        self.conn.execute_batch("BEGIN;")?;
        self.checkpoint.set(true);
        Ok(())
    }

    /// Flushes all pending writes, making them durable.
    ///
    /// Meaningful chiefly in manual-commit mode or after
    /// [`begin_transaction`](Self::begin_transaction); with per-statement
    /// durability and no open transaction this is a no-op.
    pub fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT;")?;
        }
        self.checkpoint.set(false);
        Ok(())
    }

    /// Restores all dataset state to the last checkpoint, discarding
    /// uncommitted changes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoCheckpoint`] if no checkpoint is active.
    pub fn rollback(&self) -> Result<()> {
        if !self.checkpoint.get() {
            return Err(VaultError::NoCheckpoint);
        }
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        self.checkpoint.set(false);
        Ok(())
    }

    /// Flushes pending writes and releases the connection.
    ///
    /// Dropping the handle flushes as well, so scoped use is safe on every
    /// exit path; `close` only makes the flush error observable.
    pub fn close(self) -> Result<()> {
        self.commit()
    }

    /// Opens the batching transaction lazily in manual-commit mode.
    pub(crate) fn begin_if_manual(&self) -> Result<()> {
        if self.manual_commit && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN;")?;
        }
        Ok(())
    }

    /// Runs `f` inside a savepoint so multi-statement operations are atomic
    /// in both durability modes, without disturbing an outer transaction.
    pub(crate) fn with_savepoint<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.begin_if_manual()?;
        self.conn.execute_batch("SAVEPOINT metavault_batch;")?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch("RELEASE metavault_batch;")?;
                Ok(value)
            }
            Err(e) => {
                let _ = self
                    .conn
                    .execute_batch("ROLLBACK TO metavault_batch; RELEASE metavault_batch;");
                Err(e)
            }
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("COMMIT;");
        }
    }
}
