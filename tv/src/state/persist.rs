//! Persister - actor that owns durable writes
//!
//! Cache mutations are applied in memory first and handed to this actor
//! fire-and-forget. Writes reach the store in submission order. Failures are
//! logged and counted, never surfaced to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use volumestore::KvStore;

/// Commands sent to the persister actor
#[derive(Debug)]
enum PersistCommand {
    Write { key: String, value: Value },
    Flush { reply: oneshot::Sender<()> },
}

/// Handle to the persister actor
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<PersistCommand>,
    failures: Arc<AtomicU64>,
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("failures", &self.failures.load(Ordering::Relaxed))
            .finish()
    }
}

impl Persister {
    /// Spawn the actor over `store`
    pub fn spawn(store: Arc<dyn KvStore>) -> Self {
        debug!("Persister::spawn: called");
        let (tx, rx) = mpsc::unbounded_channel();
        let failures = Arc::new(AtomicU64::new(0));
        tokio::spawn(actor_loop(store, rx, failures.clone()));
        Self { tx, failures }
    }

    /// Queue a write of `value` under `key`
    pub fn write(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        debug!(%key, "Persister::write: called");
        if self.tx.send(PersistCommand::Write { key, value }).is_err() {
            self.record_dead_actor();
        }
    }

    /// Wait until every previously queued write has been attempted
    pub async fn flush(&self) {
        debug!("Persister::flush: called");
        let (reply, rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush { reply }).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Number of writes that failed
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record_dead_actor(&self) {
        warn!("Persister: actor stopped, write dropped");
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

async fn actor_loop(store: Arc<dyn KvStore>, mut rx: mpsc::UnboundedReceiver<PersistCommand>, failures: Arc<AtomicU64>) {
    debug!("Persister actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistCommand::Write { key, value } => {
                debug!(%key, "actor_loop: Write command");
                if let Err(e) = store.set(&key, value).await {
                    warn!(%key, error = %e, "Failed to persist volume record");
                    failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            PersistCommand::Flush { reply } => {
                debug!("actor_loop: Flush command");
                let _ = reply.send(());
            }
        }
    }

    debug!("Persister actor stopped");
}
