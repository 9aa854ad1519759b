//! VolumeRecord - the persisted per-tab / per-address volume state

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::command::TabCommand;
use super::validate::{normalize_page_address, validate_volume, validate_volume_value};

/// Volume for tabs with no history
pub const DEFAULT_VOLUME: u8 = 100;

/// Volume, mute and audio-presence state for one tab or page address
///
/// `volume` and `muted` are independent: muting never clamps the stored
/// volume. The page applies `muted ? 0 : volume` as its gain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    pub volume: u8,
    pub previous_volume: u8,
    pub muted: bool,
    pub has_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_address: Option<String>,
}

impl Default for VolumeRecord {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            previous_volume: DEFAULT_VOLUME,
            muted: false,
            has_audio: true,
            is_playing: None,
            page_address: None,
        }
    }
}

/// Unvalidated field values for a write
///
/// Absent fields keep their prior value. Present fields that fail
/// validation also keep their prior value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub volume: Option<f64>,
    pub previous_volume: Option<f64>,
    pub muted: Option<bool>,
    pub has_audio: Option<bool>,
    pub is_playing: Option<bool>,
}

impl RecordDraft {
    /// Draft touching only the audio-presence flag
    pub fn has_audio(has_audio: bool) -> Self {
        Self {
            has_audio: Some(has_audio),
            ..Default::default()
        }
    }

    /// Draft touching only the playback flag
    pub fn is_playing(is_playing: bool) -> Self {
        Self {
            is_playing: Some(is_playing),
            ..Default::default()
        }
    }
}

impl From<&VolumeRecord> for RecordDraft {
    fn from(record: &VolumeRecord) -> Self {
        Self {
            volume: Some(f64::from(record.volume)),
            previous_volume: Some(f64::from(record.previous_volume)),
            muted: Some(record.muted),
            has_audio: Some(record.has_audio),
            is_playing: record.is_playing,
        }
    }
}

/// Validated volume change requested by the control panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeUpdate {
    pub volume: Option<u8>,
    pub muted: Option<bool>,
    pub previous_volume: Option<u8>,
}

impl VolumeRecord {
    /// Decode a stored value, coercing anything malformed to defaults
    ///
    /// Never fails: a non-object becomes the default record and each bad
    /// field falls back to its default independently.
    pub fn from_stored(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            debug!("VolumeRecord::from_stored: value is not an object, using defaults");
            return defaults;
        };

        let volume = obj.get("volume").and_then(validate_volume_value).unwrap_or(defaults.volume);
        let previous_volume = obj
            .get("previousVolume")
            .and_then(validate_volume_value)
            .unwrap_or(defaults.previous_volume);

        Self {
            volume,
            previous_volume,
            muted: obj.get("muted").and_then(Value::as_bool).unwrap_or(defaults.muted),
            has_audio: obj.get("hasAudio").and_then(Value::as_bool).unwrap_or(defaults.has_audio),
            is_playing: obj.get("isPlaying").and_then(Value::as_bool),
            page_address: obj
                .get("pageAddress")
                .and_then(Value::as_str)
                .and_then(normalize_page_address),
        }
    }

    /// Encode for the durable store
    pub fn to_stored(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Merge a draft, returning the names of rejected fields
    pub fn merge_draft(&mut self, draft: &RecordDraft) -> Vec<&'static str> {
        let mut rejected = Vec::new();

        if let Some(raw) = draft.volume {
            match validate_volume(raw) {
                Some(volume) => self.volume = volume,
                None => rejected.push("volume"),
            }
        }
        if let Some(raw) = draft.previous_volume {
            match validate_volume(raw) {
                Some(volume) => self.previous_volume = volume,
                None => rejected.push("previousVolume"),
            }
        }
        if let Some(muted) = draft.muted {
            self.muted = muted;
        }
        if let Some(has_audio) = draft.has_audio {
            self.has_audio = has_audio;
        }
        if let Some(is_playing) = draft.is_playing {
            self.is_playing = Some(is_playing);
        }

        rejected
    }

    /// Apply a control-panel change and return the command for the page
    ///
    /// A zero volume mutes. Muting remembers the last positive volume in
    /// `previous_volume`; unmuting a zeroed record restores it. The command
    /// depends only on the update's shape and the resulting record, so
    /// applying the same update twice yields the same command.
    pub fn apply_update(&mut self, update: &VolumeUpdate) -> TabCommand {
        if let Some(previous) = update.previous_volume {
            self.previous_volume = previous;
        }

        match update.volume {
            Some(0) => {
                if self.volume > 0 && update.previous_volume.is_none() {
                    self.previous_volume = self.volume;
                }
                self.volume = 0;
                self.muted = true;
            }
            Some(volume) => {
                self.volume = volume;
                if let Some(muted) = update.muted {
                    self.muted = muted;
                }
            }
            None => {
                if let Some(muted) = update.muted {
                    self.set_muted(muted);
                }
            }
        }

        if self.muted && self.volume > 0 && update.previous_volume.is_none() {
            self.previous_volume = self.volume;
        }

        if self.muted || update.muted.is_some() {
            self.mute_command()
        } else {
            TabCommand::SetVolume { volume: self.volume }
        }
    }

    /// Restore the remembered volume and unmute
    pub fn reset(&mut self) -> TabCommand {
        let restored = if self.previous_volume > 0 {
            self.previous_volume
        } else {
            DEFAULT_VOLUME
        };
        self.volume = restored;
        self.previous_volume = restored;
        self.muted = false;
        self.mute_command()
    }

    /// Command that brings a page in line with this record
    pub fn state_command(&self) -> TabCommand {
        if self.muted {
            self.mute_command()
        } else {
            TabCommand::SetVolume { volume: self.volume }
        }
    }

    fn mute_command(&self) -> TabCommand {
        TabCommand::ToggleMute {
            muted: self.muted,
            previous_volume: self.previous_volume,
        }
    }

    fn set_muted(&mut self, muted: bool) {
        if muted {
            if !self.muted && self.volume > 0 {
                self.previous_volume = self.volume;
            }
            self.muted = true;
        } else {
            self.muted = false;
            if self.volume == 0 {
                self.volume = if self.previous_volume > 0 {
                    self.previous_volume
                } else {
                    DEFAULT_VOLUME
                };
            }
        }
    }
}
