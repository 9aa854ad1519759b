//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use volumestore::StoreError;

use crate::domain::{TabEvent, TabId, VolumeRecord};
use crate::protocol::MessageSender;

/// Errors from talking to the Coordinator
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Coordinator channel closed")]
    ChannelClosed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Route a runtime message; `None` means no response is sent
    Message {
        sender: MessageSender,
        message: Value,
        reply: oneshot::Sender<Option<Value>>,
    },

    /// Reconcile a tab lifecycle notification
    TabEvent { event: TabEvent },

    /// Settling delay after audio start has passed (internal)
    SettleElapsed { tab_id: TabId },

    /// Run a retry sweep now
    Sweep,

    /// Get current metrics
    GetMetrics {
        reply: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Read the tracked record for a tab without side effects
    Snapshot {
        tab_id: TabId,
        reply: oneshot::Sender<Option<VolumeRecord>>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

/// Notifications for the popup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoordEvent {
    /// A tab started or stopped producing sound
    #[serde(rename_all = "camelCase")]
    AudibleChanged { tab_id: TabId, audible: bool },

    /// A tab's volume record changed
    #[serde(rename_all = "camelCase")]
    RecordChanged { tab_id: TabId, record: VolumeRecord },

    /// A tab was closed
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
}

impl CoordEvent {
    /// The tab this notification concerns
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::AudibleChanged { tab_id, .. } | Self::RecordChanged { tab_id, .. } | Self::TabRemoved { tab_id } => {
                *tab_id
            }
        }
    }
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorMetrics {
    pub requests_handled: u64,
    pub requests_rejected: u64,
    pub requests_dropped: u64,
    pub events_handled: u64,
    pub commands_delivered: u64,
    pub commands_queued: u64,
    pub retries_attempted: u64,
    pub dropped_queue_full: u64,
    pub dropped_expired: u64,
    pub dropped_exhausted: u64,
    pub persistence_failures: u64,
    pub tracked_tabs: usize,
    pub audible_tabs: usize,
    pub pending_deliveries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coord_event_serialization() {
        let event = CoordEvent::AudibleChanged {
            tab_id: 42,
            audible: true,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "audibleChanged", "tabId": 42, "audible": true}));

        let back: CoordEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.tab_id(), 42);
    }

    #[test]
    fn test_record_changed_carries_record() {
        let event = CoordEvent::RecordChanged {
            tab_id: 1,
            record: VolumeRecord::default(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("recordChanged"));
        assert!(json.contains("previousVolume"));
    }
}
