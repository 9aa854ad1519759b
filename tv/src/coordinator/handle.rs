//! CoordinatorHandle - client interface to the coordinator task

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use crate::domain::{TabEvent, TabId, VolumeRecord};
use crate::protocol::MessageSender;

use super::messages::{CoordEvent, CoordRequest, CoordinatorError, CoordinatorMetrics};

/// Cloneable handle for feeding the coordinator and reading its state
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
    events: broadcast::Sender<CoordEvent>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>, events: broadcast::Sender<CoordEvent>) -> Self {
        Self { tx, events }
    }

    async fn send(&self, req: CoordRequest) -> Result<(), CoordinatorError> {
        self.tx.send(req).await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Route a runtime message and wait for its response
    ///
    /// `Ok(None)` means the coordinator deliberately sends no response
    /// (unauthorized sender).
    pub async fn request(&self, sender: MessageSender, message: Value) -> Result<Option<Value>, CoordinatorError> {
        debug!(sender_id = ?sender.id, "CoordinatorHandle::request: called");
        let reply_rx = self.submit(sender, message).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Queue a runtime message and return the receiver for its response
    ///
    /// Messages are routed in submission order; callers may await the
    /// responses concurrently.
    pub async fn submit(
        &self,
        sender: MessageSender,
        message: Value,
    ) -> Result<oneshot::Receiver<Option<Value>>, CoordinatorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Message { sender, message, reply }).await?;
        Ok(reply_rx)
    }

    /// Hand a tab lifecycle notification to the reconciler
    pub async fn tab_event(&self, event: TabEvent) -> Result<(), CoordinatorError> {
        debug!(tab_id = %event.tab_id(), kind = event.kind(), "CoordinatorHandle::tab_event: called");
        self.send(CoordRequest::TabEvent { event }).await
    }

    /// Trigger a retry sweep outside the regular interval
    pub async fn sweep(&self) -> Result<(), CoordinatorError> {
        debug!("CoordinatorHandle::sweep: called");
        self.send(CoordRequest::Sweep).await
    }

    /// Get current metrics
    pub async fn metrics(&self) -> Result<CoordinatorMetrics, CoordinatorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(CoordRequest::GetMetrics { reply }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Tracked record for a tab, without the fallback lookup
    pub async fn snapshot(&self, tab_id: TabId) -> Result<Option<VolumeRecord>, CoordinatorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(CoordRequest::Snapshot { tab_id, reply }).await?;
        reply_rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    /// Subscribe to popup notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CoordEvent> {
        self.events.subscribe()
    }

    /// Stop the coordinator after it drains earlier requests
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        debug!("CoordinatorHandle::shutdown: called");
        self.send(CoordRequest::Shutdown).await
    }
}
