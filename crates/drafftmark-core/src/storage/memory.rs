//! In-memory scene store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{BoxFuture, SceneStore, StorageError, StorageResult};

type SceneKey = (String, String);

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SceneKey, serde_json::Value>>,
    fail_writes: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`remove` fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.write() {
            *flag = fail;
        }
    }

    fn check_writable(&self) -> StorageResult<()> {
        let fail = self
            .fail_writes
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        if *fail {
            return Err(StorageError::Io("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl SceneStore for MemoryStore {
    fn get(&self, scene: &str, key: &str) -> BoxFuture<'_, StorageResult<Option<serde_json::Value>>> {
        let key = (scene.to_string(), key.to_string());
        Box::pin(async move {
            let entries = self
                .entries
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(entries.get(&key).cloned())
        })
    }

    fn set(&self, scene: &str, key: &str, value: serde_json::Value) -> BoxFuture<'_, StorageResult<()>> {
        let key = (scene.to_string(), key.to_string());
        Box::pin(async move {
            self.check_writable()?;
            let mut entries = self
                .entries
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            entries.insert(key, value);
            Ok(())
        })
    }

    fn remove(&self, scene: &str, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = (scene.to_string(), key.to_string());
        Box::pin(async move {
            self.check_writable()?;
            let mut entries = self
                .entries
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            entries.remove(&key);
            Ok(())
        })
    }
}
