//! Inbound runtime messages
//!
//! A message is a JSON object with an `action` string. Known actions decode
//! into [`Request`]; the field types are fixed by the enum, and values that
//! are well-typed but out of range are rejected by the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::delivery::DeliveryError;
use crate::domain::validate::{is_valid_mute_flag, is_valid_tab_id, validate_volume};
use crate::domain::{TabId, TabInfo, VolumeUpdate};

/// Every action name the router recognizes
pub const ACTIONS: &[&str] = &[
    "contentScriptReady",
    "getAudibleTabs",
    "updateTabVolume",
    "getAudioStatus",
    "updateTabStatus",
    "togglePlayback",
    "getTabVolume",
    "resetTabVolume",
    "updatePlaybackState",
];

const FLAG_FIELDS: &[&str] = &["muted", "hasAudio", "isPlaying"];

/// Errors answered as `{success: false, error}`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Unknown action")]
    UnknownAction,

    #[error("Invalid request: {0}")]
    Malformed(String),

    #[error("Invalid {0}: expected a boolean")]
    InvalidFlag(&'static str),

    #[error("Message has no sender tab")]
    MissingSenderTab,

    #[error("Invalid tab id: {0}")]
    InvalidTabId(TabId),

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Invalid previous volume: {0}")]
    InvalidPreviousVolume(String),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Identity of whoever sent a runtime message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    /// Extension id of the sending context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Present when the message came from a page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<TabInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MessageSender {
    /// Sender for a page context in `tab`
    pub fn from_tab(extension_id: impl Into<String>, tab: TabInfo) -> Self {
        Self {
            id: Some(extension_id.into()),
            tab: Some(tab),
            url: None,
        }
    }

    /// Sender for an extension page such as the popup
    pub fn extension(extension_id: impl Into<String>) -> Self {
        Self {
            id: Some(extension_id.into()),
            tab: None,
            url: None,
        }
    }

    /// The sender's tab, validated
    pub fn tab_id(&self) -> Result<TabId, RequestError> {
        let tab = self.tab.as_ref().ok_or(RequestError::MissingSenderTab)?;
        check_tab_id(tab.id)
    }

    /// The sender tab's page address, if any
    pub fn tab_url(&self) -> Option<&str> {
        self.tab.as_ref().and_then(|t| t.url.as_deref())
    }
}

/// A decoded inbound request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// The sender tab's page controller has loaded
    ContentScriptReady,

    /// Popup listing of tabs with audio
    GetAudibleTabs,

    /// Popup volume/mute change for a tab
    #[serde(rename_all = "camelCase")]
    UpdateTabVolume {
        tab_id: TabId,
        #[serde(default)]
        volume: Option<f64>,
        #[serde(default)]
        muted: Option<bool>,
        #[serde(default)]
        previous_volume: Option<f64>,
    },

    /// Page controller asks for its tab's volume state
    GetAudioStatus,

    /// Page controller reports whether it found media
    #[serde(rename_all = "camelCase")]
    UpdateTabStatus { has_audio: bool },

    /// Popup play/pause button
    #[serde(rename_all = "camelCase")]
    TogglePlayback { tab_id: TabId },

    /// Popup read of one tab's record
    #[serde(rename_all = "camelCase")]
    GetTabVolume { tab_id: TabId },

    /// Popup reset button
    #[serde(rename_all = "camelCase")]
    ResetTabVolume { tab_id: TabId },

    /// Page controller reports play state
    #[serde(rename_all = "camelCase")]
    UpdatePlaybackState { is_playing: bool },
}

impl Request {
    /// Decode a raw message
    ///
    /// A missing or unrecognized action is reported as unknown. Flag fields
    /// that are present but not booleans get a field-specific error.
    pub fn parse(message: &Value) -> Result<Self, RequestError> {
        let action = message.get("action").and_then(Value::as_str).unwrap_or_default();
        debug!(%action, "Request::parse: called");
        if !ACTIONS.contains(&action) {
            return Err(RequestError::UnknownAction);
        }

        for field in FLAG_FIELDS {
            if let Some(value) = message.get(*field)
                && !value.is_null()
                && !is_valid_mute_flag(value)
            {
                return Err(RequestError::InvalidFlag(*field));
            }
        }

        serde_json::from_value(message.clone()).map_err(|e| RequestError::Malformed(e.to_string()))
    }

    /// Wire action name
    pub fn action(&self) -> &'static str {
        match self {
            Self::ContentScriptReady => "contentScriptReady",
            Self::GetAudibleTabs => "getAudibleTabs",
            Self::UpdateTabVolume { .. } => "updateTabVolume",
            Self::GetAudioStatus => "getAudioStatus",
            Self::UpdateTabStatus { .. } => "updateTabStatus",
            Self::TogglePlayback { .. } => "togglePlayback",
            Self::GetTabVolume { .. } => "getTabVolume",
            Self::ResetTabVolume { .. } => "resetTabVolume",
            Self::UpdatePlaybackState { .. } => "updatePlaybackState",
        }
    }
}

/// Reject tab ids outside the browser's range
pub fn check_tab_id(tab_id: TabId) -> Result<TabId, RequestError> {
    if is_valid_tab_id(tab_id) {
        Ok(tab_id)
    } else {
        Err(RequestError::InvalidTabId(tab_id))
    }
}

/// Validate the optional fields of a volume change
pub fn volume_update(
    volume: Option<f64>,
    muted: Option<bool>,
    previous_volume: Option<f64>,
) -> Result<VolumeUpdate, RequestError> {
    let volume = volume
        .map(|v| validate_volume(v).ok_or_else(|| RequestError::InvalidVolume(v.to_string())))
        .transpose()?;
    let previous_volume = previous_volume
        .map(|v| validate_volume(v).ok_or_else(|| RequestError::InvalidPreviousVolume(v.to_string())))
        .transpose()?;
    Ok(VolumeUpdate {
        volume,
        muted,
        previous_volume,
    })
}
