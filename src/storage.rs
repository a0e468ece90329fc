use rusqlite::{Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing {key}: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },
    #[error("sqlite storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Durable string key/value storage behind the persisted store.
pub trait Storage {
    fn backend_name(&self) -> &'static str;
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Swaps the whole contents for `entries`. When a write fails the
    /// previous entries are put back before the error is returned.
    fn replace_all(&mut self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let mut previous = BTreeMap::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                previous.insert(key, value);
            }
        }
        if let Err(e) = overwrite(self, entries) {
            if let Err(rollback) = overwrite(self, &previous) {
                warn!(error = %rollback, "rolling back a failed replace also failed");
            }
            return Err(e);
        }
        Ok(())
    }
}

fn overwrite<S: Storage + ?Sized>(
    storage: &mut S,
    entries: &BTreeMap<String, String>,
) -> Result<(), StorageError> {
    for key in storage.keys()? {
        storage.remove(&key)?;
    }
    for (key, value) in entries {
        storage.set(key, value)?;
    }
    Ok(())
}

/// In-process storage. Handles returned by [`MemoryStorage::shared`] see the
/// same entries, which is how two concurrent writers are modelled in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Rc::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn shared(&self) -> Self {
        self.clone()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Storage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota_bytes {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

/// Workspace storage in the `kv_entries` table created by `db::open_db`.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Storage for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_entries WHERE key = ?", [key], |r| {
                r.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv_entries(key, value, updated_at)
             VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            (key, value),
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?", [key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// One transaction; an error drops it and SQLite rolls back.
    fn replace_all(&mut self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM kv_entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO kv_entries(key, value, updated_at)
                 VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            )?;
            for (key, value) in entries {
                stmt.execute((key.as_str(), value.as_str()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
