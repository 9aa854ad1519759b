//! In-memory store backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::store::KvStore;

/// Volatile store backed by a map
///
/// Writes can be made to fail on demand, which lets callers exercise their
/// storage-error paths without a broken disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            entries: Mutex::new(entries),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        debug!(fail, "MemoryStore::set_fail_writes: called");
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        debug!(%key, "MemoryStore::set: called");
        self.check_writable()?;
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        debug!(%key, "MemoryStore::remove: called");
        self.check_writable()?;
        Ok(self.entries.lock().await.remove(key).is_some())
    }
}
