//! The key/value store abstraction

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Asynchronous key/value storage that survives process restarts
///
/// Implementations must be safe to share between tasks. Writes are
/// last-write-wins per key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read every stored entry
    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError>;

    /// Read a single entry
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace a single entry
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a single entry, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;
}
