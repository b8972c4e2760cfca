//! Push channel message types
//!
//! Every message exchanged over the push channel is an envelope of the form
//! `{"type": "<TAG>", "payload": {...}}`. Outbound messages are
//! [`BroadcastEvent`]s, inbound ones are [`ClientMessage`]s.

mod playback_types;

pub use playback_types::{DeviceState, DeviceStatus, PlaybackStatus, TrackInfo, Volume};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Inbound message tags (client -> server)
pub const INBOUND_TYPES: &[&str] = &["SET_VOLUME", "PLAYBACK_CONTROL", "GET_STATE"];

/// Outbound message tags (server -> client)
pub const OUTBOUND_TYPES: &[&str] = &[
    "STATE_UPDATE",
    "VOLUME_CHANGED",
    "PLAYBACK_CHANGED",
    "ERROR",
];

/// Event sent to push subscribers
///
/// Produced by the dispatcher (or the registry on join) and serialized once
/// per broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastEvent {
    /// Full device snapshot
    StateUpdate(DeviceState),

    /// Volume changed to the given value
    VolumeChanged { volume: Volume },

    /// Playback status changed
    PlaybackChanged { status: PlaybackStatus },

    /// Failure report, only ever sent to the connection that caused it
    Error { message: String },
}

impl BroadcastEvent {
    pub fn error(message: impl Into<String>) -> Self {
        BroadcastEvent::Error {
            message: message.into(),
        }
    }

    /// Wire tag of this event
    pub fn tag(&self) -> &'static str {
        match self {
            BroadcastEvent::StateUpdate(_) => "STATE_UPDATE",
            BroadcastEvent::VolumeChanged { .. } => "VOLUME_CHANGED",
            BroadcastEvent::PlaybackChanged { .. } => "PLAYBACK_CHANGED",
            BroadcastEvent::Error { .. } => "ERROR",
        }
    }

    /// Serialize to the JSON text frame sent to clients
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Internal(e.to_string()))
    }
}

/// Transport command carried by `PLAYBACK_CONTROL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    Stop,
}

impl std::str::FromStr for PlaybackCommand {
    type Err = InboundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAY" => Ok(PlaybackCommand::Play),
            "PAUSE" => Ok(PlaybackCommand::Pause),
            "TOGGLE" => Ok(PlaybackCommand::Toggle),
            "NEXT" => Ok(PlaybackCommand::Next),
            "PREVIOUS" => Ok(PlaybackCommand::Previous),
            "STOP" => Ok(PlaybackCommand::Stop),
            other => Err(InboundError::InvalidPayload(format!(
                "Unknown playback command: {}",
                other
            ))),
        }
    }
}

/// Message received from a push subscriber
///
/// The volume of `SetVolume` is kept raw so that range and type checks
/// happen in one place, before any device call.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    SetVolume { volume: Value },
    PlaybackControl { command: PlaybackCommand },
    GetState,
}

/// Reasons an inbound text frame cannot be turned into a [`ClientMessage`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InboundError {
    /// Frame is not a JSON envelope
    #[error("{0}")]
    Malformed(String),

    /// Envelope tag is not a known inbound type
    #[error("Unknown command: {0}")]
    UnknownType(String),

    /// Known tag with an unusable payload
    #[error("{0}")]
    InvalidPayload(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl ClientMessage {
    /// Parse an inbound text frame
    pub fn parse(text: &str) -> Result<Self, InboundError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| InboundError::Malformed(e.to_string()))?;

        match envelope.kind.as_str() {
            "SET_VOLUME" => Ok(ClientMessage::SetVolume {
                volume: envelope.payload.get("volume").cloned().unwrap_or(Value::Null),
            }),
            "PLAYBACK_CONTROL" => {
                let command = envelope
                    .payload
                    .get("command")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        InboundError::InvalidPayload("Missing playback command".to_string())
                    })?;
                Ok(ClientMessage::PlaybackControl {
                    command: command.parse()?,
                })
            }
            "GET_STATE" => Ok(ClientMessage::GetState),
            other => Err(InboundError::UnknownType(other.to_string())),
        }
    }
}

/// Catalog of push channel message tags, for front-end discovery
pub fn message_catalog() -> Value {
    serde_json::json!({
        "inbound": INBOUND_TYPES,
        "outbound": OUTBOUND_TYPES,
    })
}
