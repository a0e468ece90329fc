use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::db;
use crate::storage::{MemoryStorage, SqliteStorage};
use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    /// Set while the store is backed by a workspace database.
    pub workspace: Option<PathBuf>,
    pub store: Store,
    pub memory_quota: Option<usize>,
}

fn memory_store(quota: Option<usize>) -> Store {
    let storage = match quota {
        Some(bytes) => MemoryStorage::with_quota(bytes),
        None => MemoryStorage::new(),
    };
    Store::new(Box::new(storage))
}

impl AppState {
    pub fn in_memory(memory_quota: Option<usize>) -> Self {
        Self {
            workspace: None,
            store: memory_store(memory_quota),
            memory_quota,
        }
    }

    /// Rebinds the store to the workspace database, creating it if needed.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let conn = db::open_db(path)?;
        self.store = Store::new(Box::new(SqliteStorage::new(conn)));
        self.workspace = Some(path.to_path_buf());
        info!(workspace = %path.display(), "workspace opened");
        Ok(())
    }

    pub fn close_workspace(&mut self) {
        self.store = memory_store(self.memory_quota);
        if let Some(path) = self.workspace.take() {
            info!(workspace = %path.display(), "workspace closed, using memory storage");
        }
    }
}
