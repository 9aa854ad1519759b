//! The coordinator's view of the browser's tab messaging

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CommandReply, TabCommand, TabId, TabInfo};

/// Errors from outbound tab messaging
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("No receiving end in tab {0}")]
    NoReceiver(TabId),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Host disconnected")]
    Disconnected,
}

impl DeliveryError {
    /// Whether the destination may accept the command later
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Outbound messaging to tabs
///
/// Calls may never complete when a page has no controller to answer;
/// callers wrap every call in a timeout.
#[async_trait]
pub trait TabPort: Send + Sync {
    /// Deliver a command to the page loaded in `tab_id`
    async fn send_command(&self, tab_id: TabId, command: &TabCommand) -> Result<CommandReply, DeliveryError>;

    /// List the browser's open tabs
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, DeliveryError>;
}
