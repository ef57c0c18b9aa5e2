//! Key-value stores for persisting the log history across restarts.
//!
//! The logger stores each collection as one serialized JSON array under a
//! fixed key. Absent keys read as `None`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::CoreResult;

const LOG_STORE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("log_store");

/// Persisted log store surface.
pub trait LogStore: Send + Sync {
    fn get(&self, key: &str) -> CoreResult<Option<String>>;

    fn set(&self, key: &str, value: String) -> CoreResult<()>;

    fn remove(&self, key: &str) -> CoreResult<()>;
}

/// In-process store, for tests and for embedders without device storage.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLogStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> CoreResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Log store backed by a single redb table.
#[derive(Clone)]
pub struct RedbLogStore {
    db: Arc<RwLock<Database>>,
}

impl RedbLogStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LOG_STORE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}

impl LogStore for RedbLogStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(LOG_STORE_TABLE)?;

        match table.get(key)? {
            Some(v) => Ok(Some(String::from_utf8_lossy(v.value()).into_owned())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: String) -> CoreResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOG_STORE_TABLE)?;
            table.insert(key, value.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOG_STORE_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryLogStore::new();
        assert_eq!(store.get("logs").unwrap(), None);

        store.set("logs", "[]".to_string()).unwrap();
        assert_eq!(store.get("logs").unwrap().as_deref(), Some("[]"));

        store.remove("logs").unwrap();
        assert_eq!(store.get("logs").unwrap(), None);
    }

    #[test]
    fn test_redb_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("store.redb");

        {
            let store = RedbLogStore::open(&path).unwrap();
            store.set("readsync.logs", "[1,2,3]".to_string()).unwrap();
        }

        let store = RedbLogStore::open(&path).unwrap();
        assert_eq!(store.get("readsync.logs").unwrap().as_deref(), Some("[1,2,3]"));

        store.remove("readsync.logs").unwrap();
        assert_eq!(store.get("readsync.logs").unwrap(), None);
    }
}
