//! Playback-related type definitions
//!
//! Value types describing the state of the controlled device. None of these
//! are stored by the shim: they are read from the device on demand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Device volume on the user-facing 0-100 scale
///
/// A `Volume` can only be constructed inside its range, so any value that
/// reaches a device has already been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Volume(u8);

impl Volume {
    /// Lowest accepted volume
    pub const MIN: u8 = 0;
    /// Highest accepted volume
    pub const MAX: u8 = 100;

    /// Validate an integer volume
    pub fn new(value: i64) -> Result<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(Error::InvalidInput(format!(
                "Volume must be an integer between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// Clamp an integer into range
    pub fn saturating(value: i64) -> Self {
        Self(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    /// Validate a volume taken from a JSON document
    ///
    /// Only JSON integers are accepted: strings, floats, booleans and
    /// missing values are rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(v) => Self::new(v),
                None => Err(Error::InvalidInput(format!(
                    "Volume must be an integer between {} and {}, got {}",
                    Self::MIN,
                    Self::MAX,
                    n
                ))),
            },
            Value::Null => Err(Error::InvalidInput("Missing volume".to_string())),
            other => Err(Error::InvalidInput(format!(
                "Volume must be an integer between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                other
            ))),
        }
    }

    /// Raw volume value
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Volume {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Volume> for u8 {
    fn from(volume: Volume) -> u8 {
        volume.0
    }
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback status reported by the device
///
/// Vendor-specific states that do not map onto the known ones are carried
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Audio is playing
    Playing,
    /// Playback is paused
    Paused,
    /// Playback is stopped
    Stopped,
    /// Any other vendor status
    #[serde(untagged)]
    Other(String),
}

impl PlaybackStatus {
    /// Parse a vendor status string (case-insensitive)
    pub fn from_vendor(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "playing" | "play" => PlaybackStatus::Playing,
            "paused" | "pause" => PlaybackStatus::Paused,
            "stopped" | "stop" => PlaybackStatus::Stopped,
            _ => PlaybackStatus::Other(raw.to_string()),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
            PlaybackStatus::Stopped => write!(f, "stopped"),
            PlaybackStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Result of a device status query
///
/// `extra` holds any additional vendor fields, which are passed through to
/// clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Current playback status
    pub status: PlaybackStatus,
    /// Vendor-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceStatus {
    pub fn new(status: PlaybackStatus) -> Self {
        Self {
            status,
            extra: Map::new(),
        }
    }
}

/// Metadata of the current track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Artwork reference (URL) if the device exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_url: Option<String>,
    /// Vendor-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full snapshot of the device as sent in `STATE_UPDATE`
///
/// Serialized flat: `{"volume": 40, "status": "paused", ...vendor fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub volume: Volume,
    #[serde(flatten)]
    pub status: DeviceStatus,
}

impl DeviceState {
    pub fn new(volume: Volume, status: DeviceStatus) -> Self {
        Self { volume, status }
    }

    pub fn playback_status(&self) -> &PlaybackStatus {
        &self.status.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_volume_bounds() {
        assert_eq!(Volume::new(0).unwrap().get(), 0);
        assert_eq!(Volume::new(100).unwrap().get(), 100);
        assert!(Volume::new(-1).is_err());
        assert!(Volume::new(101).is_err());
        assert_eq!(Volume::saturating(150).get(), 100);
        assert_eq!(Volume::saturating(-3).get(), 0);
    }

    #[test]
    fn test_volume_from_json_rejects_non_integers() {
        assert_eq!(Volume::from_json(&json!(40)).unwrap().get(), 40);
        assert!(Volume::from_json(&json!(150)).is_err());
        assert!(Volume::from_json(&json!(50.5)).is_err());
        assert!(Volume::from_json(&json!("50")).is_err());
        assert!(Volume::from_json(&json!(true)).is_err());
        assert!(Volume::from_json(&Value::Null).is_err());
        assert!(Volume::from_json(&json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_volume_deserialize_validates() {
        let v: Volume = serde_json::from_value(json!(75)).unwrap();
        assert_eq!(v.get(), 75);
        assert!(serde_json::from_value::<Volume>(json!(200)).is_err());
    }

    #[test]
    fn test_playback_status_serialization() {
        assert_eq!(serde_json::to_value(PlaybackStatus::Playing).unwrap(), json!("playing"));
        assert_eq!(serde_json::to_value(PlaybackStatus::Paused).unwrap(), json!("paused"));
        assert_eq!(
            serde_json::to_value(PlaybackStatus::Other("buffering".into())).unwrap(),
            json!("buffering")
        );

        let status: PlaybackStatus = serde_json::from_value(json!("stopped")).unwrap();
        assert_eq!(status, PlaybackStatus::Stopped);
        let status: PlaybackStatus = serde_json::from_value(json!("buffering")).unwrap();
        assert_eq!(status, PlaybackStatus::Other("buffering".into()));
    }

    #[test]
    fn test_playback_status_from_vendor() {
        assert_eq!(PlaybackStatus::from_vendor("PLAYING"), PlaybackStatus::Playing);
        assert_eq!(PlaybackStatus::from_vendor("pause"), PlaybackStatus::Paused);
        assert_eq!(
            PlaybackStatus::from_vendor("unknown"),
            PlaybackStatus::Other("unknown".into())
        );
    }

    #[test]
    fn test_device_state_serializes_flat() {
        let mut status = DeviceStatus::new(PlaybackStatus::Paused);
        status.extra.insert("player".into(), json!("mpd"));
        let state = DeviceState::new(Volume::new(40).unwrap(), status);

        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({ "volume": 40, "status": "paused", "player": "mpd" })
        );
    }
}
