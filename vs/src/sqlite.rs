//! SQLite store backend
//!
//! One table, one row per key. Values are stored as JSON text; rows whose
//! text no longer parses are returned as JSON strings so callers can coerce
//! them instead of failing the whole read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::KvStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY NOT NULL,
    value       TEXT NOT NULL,
    updated_at  INTEGER NOT NULL
);
";

/// A stored row with its modification time
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// Durable store backed by a SQLite file
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "SqliteStore::open: called");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.display(), "Opened volume store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("SqliteStore::open_in_memory: called");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Path of the backing file (None for in-memory databases)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// List every row with its modification time, ordered by key
    pub async fn list_entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        debug!("SqliteStore::list_entries: called");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value, updated_at FROM kv ORDER BY key")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (key, raw, updated_ms) = row?;
                let updated_at = Utc.timestamp_millis_opt(updated_ms).single().unwrap_or_default();
                entries.push(StoredEntry {
                    value: decode_value(&key, raw),
                    key,
                    updated_at,
                });
            }
            Ok(entries)
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Decode stored text, keeping unparsable rows as raw strings
fn decode_value(key: &str, raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(%key, error = %e, "Stored value is not valid JSON, returning raw text");
            Value::String(raw)
        }
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get_all(&self) -> Result<HashMap<String, Value>, StoreError> {
        debug!("SqliteStore::get_all: called");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

            let mut entries = HashMap::new();
            for row in rows {
                let (key, raw) = row?;
                let value = decode_value(&key, raw);
                entries.insert(key, value);
            }
            Ok(entries)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        debug!(%key, "SqliteStore::get: called");
        let key = key.to_string();
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
                .optional()?;
            Ok(raw.map(|raw| decode_value(&key, raw)))
        })
        .await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        debug!(%key, "SqliteStore::set: called");
        let key = key.to_string();
        let text = serde_json::to_string(&value)?;
        let now = Utc::now().timestamp_millis();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, text, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        debug!(%key, "SqliteStore::remove: called");
        let key = key.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(changed > 0)
        })
        .await
    }
}
