//! VolumeStore - durable key/value storage for volume records
//!
//! The coordinator keeps its authoritative state in memory and writes through
//! to a [`KvStore`] on every mutation. Two key families exist:
//!
//! - `tab-volume-<tabId>` - state for one open tab (ephemeral identifier)
//! - `url-volume-<pageAddress>` - state remembered for a page address
//!
//! Values are JSON documents. Backends never interpret them; decoding and
//! coercion of legacy or garbled values is the caller's concern.
//!
//! # Backends
//!
//! - [`SqliteStore`] - single-file SQLite database, used by the daemon
//! - [`MemoryStore`] - in-process map, used by tests and dry runs

mod error;
mod keys;
mod memory;
mod sqlite;
mod store;

pub use error::StoreError;
pub use keys::{StoreKey, TAB_KEY_PREFIX, URL_KEY_PREFIX};
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoredEntry};
pub use store::KvStore;
