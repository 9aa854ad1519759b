//! Tab identity and lifecycle notifications

use serde::{Deserialize, Serialize};

/// Browser-assigned tab identifier, valid only while the tab is open
pub type TabId = i64;

/// Live tab details as reported by the browser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub audible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
}

impl TabInfo {
    /// Minimal tab with only an identifier
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Builder: set the page address
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builder: set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder: set the live audible flag
    pub fn with_audible(mut self, audible: bool) -> Self {
        self.audible = audible;
        self
    }
}

/// Page load status carried by update notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
    Unloaded,
}

/// Tab lifecycle notification
///
/// `Updated` mirrors the browser's change-info object: any combination of
/// fields may be present in one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TabEvent {
    Created {
        tab: TabInfo,
    },
    #[serde(rename_all = "camelCase")]
    Updated {
        tab_id: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audible: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<LoadStatus>,
    },
    #[serde(rename_all = "camelCase")]
    Removed {
        tab_id: TabId,
    },
    #[serde(rename_all = "camelCase")]
    Activated {
        tab_id: TabId,
    },
}

impl TabEvent {
    /// The tab this notification concerns
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::Created { tab } => tab.id,
            Self::Updated { tab_id, .. } | Self::Removed { tab_id } | Self::Activated { tab_id } => *tab_id,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Removed { .. } => "removed",
            Self::Activated { .. } => "activated",
        }
    }

    /// Audio-started notification
    pub fn audio_started(tab_id: TabId) -> Self {
        Self::Updated {
            tab_id,
            url: None,
            audible: Some(true),
            status: None,
        }
    }

    /// Audio-stopped notification
    pub fn audio_stopped(tab_id: TabId) -> Self {
        Self::Updated {
            tab_id,
            url: None,
            audible: Some(false),
            status: None,
        }
    }

    /// Navigation notification
    pub fn navigated(tab_id: TabId, url: impl Into<String>) -> Self {
        Self::Updated {
            tab_id,
            url: Some(url.into()),
            audible: None,
            status: None,
        }
    }
}

/// Audio phase of a tab the coordinator has seen
///
/// Tabs never seen are unknown; removed tabs are forgotten entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabPhase {
    #[default]
    Unknown,
    Audible,
    Silent,
}
