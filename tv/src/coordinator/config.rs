//! Coordinator configuration

use serde::{Deserialize, Serialize};

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Only messages from this extension are answered; empty accepts any
    #[serde(rename = "extension-id", default)]
    pub extension_id: String,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Broadcast buffer size for popup notifications
    #[serde(rename = "event-buffer", default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_channel_buffer() -> usize {
    256
}

fn default_event_buffer() -> usize {
    64
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            extension_id: String::new(),
            channel_buffer: default_channel_buffer(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl CoordinatorConfig {
    /// Whether a sender with `sender_id` may talk to the coordinator
    pub fn accepts(&self, sender_id: Option<&str>) -> bool {
        self.extension_id.is_empty() || sender_id == Some(self.extension_id.as_str())
    }

    /// Builder: restrict to one extension id
    pub fn with_extension_id(mut self, extension_id: impl Into<String>) -> Self {
        self.extension_id = extension_id.into();
        self
    }
}
