//! Persistent Store
//!
//! Durable key-value storage for client-held session state. Values are JSON
//! strings; interpreting them is left to the owner of each key.

use std::{
    collections::HashMap,
    fmt,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use mockall::automock;
use redb::{Database, ReadableTable, TableDefinition};
use thiserror::Error;
use tracing::{debug, info};

/// Key holding the cart lines.
pub const CART_KEY: &str = "cart";

/// Key holding the wishlist entries.
pub const WISHLIST_KEY: &str = "wishlist";

/// Key holding the recent search terms.
pub const RECENT_SEARCHES_KEY: &str = "recent_searches";

const STATE: TableDefinition<&str, &str> = TableDefinition::new("state");

/// Errors raised by a persistent store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The embedded database failed.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// The state directory could not be prepared.
    #[error("failed to prepare state directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value persistence that survives restarts.
#[automock]
pub trait PersistentStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Delete the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Process-local store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
            ),
        }
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);

        values.insert(key.to_string(), value.to_string());

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);

        values.remove(key);

        Ok(())
    }
}

/// Store backed by an embedded `redb` database file.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        info!("opening state database at {}", path.display());

        let db = Database::create(&path).map_err(redb::Error::from)?;

        let write = db.begin_write().map_err(redb::Error::from)?;
        {
            write.open_table(STATE).map_err(redb::Error::from)?;
        }
        write.commit().map_err(redb::Error::from)?;

        Ok(Self { db, path })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PersistentStore for RedbStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let read = self.db.begin_read().map_err(redb::Error::from)?;
        let table = read.open_table(STATE).map_err(redb::Error::from)?;
        let value = table.get(key).map_err(redb::Error::from)?;

        Ok(value.map(|value| value.value().to_string()))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let write = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = write.open_table(STATE).map_err(redb::Error::from)?;
            table.insert(key, value).map_err(redb::Error::from)?;
        }
        write.commit().map_err(redb::Error::from)?;

        debug!(key, bytes = value.len(), "persisted state");

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let write = self.db.begin_write().map_err(redb::Error::from)?;
        {
            let mut table = write.open_table(STATE).map_err(redb::Error::from)?;
            table.remove(key).map_err(redb::Error::from)?;
        }
        write.commit().map_err(redb::Error::from)?;

        Ok(())
    }
}
