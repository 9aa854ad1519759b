//! Commands sent from the coordinator to a page's audio controller

use serde::{Deserialize, Serialize};

/// Cross-context command delivered to one tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TabCommand {
    /// Set the gain to `volume` percent
    SetVolume { volume: u8 },

    /// Mute, or unmute back to `previous_volume`
    #[serde(rename_all = "camelCase")]
    ToggleMute { muted: bool, previous_volume: u8 },

    /// Toggle playback of the page's media
    PlayPauseAudio,
}

impl TabCommand {
    /// Wire action name
    pub fn action(&self) -> &'static str {
        match self {
            Self::SetVolume { .. } => "setVolume",
            Self::ToggleMute { .. } => "toggleMute",
            Self::PlayPauseAudio => "playPauseAudio",
        }
    }

    /// Whether delivering the command twice has the same effect as once
    ///
    /// Only idempotent commands go through the retry queue.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Self::PlayPauseAudio)
    }
}

/// Reply from the page-side audio controller
///
/// Every field is optional on the wire; pages answer with whatever subset
/// applies to the command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_audio: Option<bool>,
}

impl CommandReply {
    /// Plain success reply
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            serde_json::to_value(TabCommand::SetVolume { volume: 100 }).unwrap(),
            json!({"action": "setVolume", "volume": 100})
        );
        assert_eq!(
            serde_json::to_value(TabCommand::ToggleMute {
                muted: true,
                previous_volume: 80
            })
            .unwrap(),
            json!({"action": "toggleMute", "muted": true, "previousVolume": 80})
        );
        assert_eq!(
            serde_json::to_value(TabCommand::PlayPauseAudio).unwrap(),
            json!({"action": "playPauseAudio"})
        );
    }

    #[test]
    fn test_action_names_match_wire() {
        for command in [
            TabCommand::SetVolume { volume: 5 },
            TabCommand::ToggleMute {
                muted: false,
                previous_volume: 5,
            },
            TabCommand::PlayPauseAudio,
        ] {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["action"], command.action());
        }
    }

    #[test]
    fn test_play_pause_is_not_idempotent() {
        assert!(TabCommand::SetVolume { volume: 1 }.is_idempotent());
        assert!(!TabCommand::PlayPauseAudio.is_idempotent());
    }

    #[test]
    fn test_reply_tolerates_partial_fields() {
        let reply: CommandReply = serde_json::from_value(json!({"success": true, "isPlaying": false})).unwrap();
        assert!(reply.success);
        assert_eq!(reply.is_playing, Some(false));
        assert_eq!(reply.volume, None);

        let empty: CommandReply = serde_json::from_value(json!({})).unwrap();
        assert!(!empty.success);
    }
}
