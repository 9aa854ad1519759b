//! Responses to inbound runtime messages

use serde::Serialize;
use serde_json::Value;

use crate::domain::{TabInfo, VolumeRecord};

use super::request::RequestError;

/// A live tab listed for the popup, with its volume record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudibleTab {
    #[serde(flatten)]
    pub tab: TabInfo,
    #[serde(flatten)]
    pub record: VolumeRecord,
}

/// Exactly one of these answers every routed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ack {
        success: bool,
    },
    Failure {
        success: bool,
        error: String,
    },
    Tabs {
        tabs: Vec<AudibleTab>,
    },
    #[serde(rename_all = "camelCase")]
    AudioStatus {
        volume: u8,
        muted: bool,
        previous_volume: u8,
    },
    #[serde(rename_all = "camelCase")]
    Playback {
        success: bool,
        is_playing: bool,
    },
    Record {
        success: bool,
        record: VolumeRecord,
    },
}

impl Response {
    /// `{success: true}`
    pub fn ok() -> Self {
        Self::Ack { success: true }
    }

    /// `{success: false, error}`
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }

    /// Volume fields of a record
    pub fn audio_status(record: &VolumeRecord) -> Self {
        Self::AudioStatus {
            volume: record.volume,
            muted: record.muted,
            previous_volume: record.previous_volume,
        }
    }

    /// Encode for the wire
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| serde_json::json!({"success": false, "error": e.to_string()}))
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Self::failure(err.to_string())
    }
}
