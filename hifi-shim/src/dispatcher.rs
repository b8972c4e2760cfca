//! Command dispatcher
//!
//! Single entry point for both the REST and the push surface. For every
//! command the device call is awaited to completion before the matching
//! event is broadcast, so no subscriber ever sees a change the device has
//! not applied. A failed device call broadcasts nothing: the error goes back
//! to the caller only.
//!
//! # Broadcast shape
//!
//! | Command | Device call | Broadcast |
//! |---------|-------------|-----------|
//! | `SetVolume(v)` | `set_volume(v)` | `VOLUME_CHANGED {v}` |
//! | `Play` / `Pause` | `play()` / `pause()` | `PLAYBACK_CHANGED` |
//! | `TogglePlayPause` | `get_status()`, then `pause()` or `play()` | `PLAYBACK_CHANGED` |
//! | `Next` / `Previous` / `Stop` | matching call | `STATE_UPDATE` re-read from the device |
//! | `GetState` | `get_volume()` + `get_status()` | none (reply to caller) |
//!
//! Commands whose result is implied by the command itself broadcast a delta.
//! Commands whose result depends on the device broadcast a full snapshot.
//!
//! # Concurrency
//!
//! Commands from different connections interleave at await points. Two
//! `SetVolume` commands racing each other end with whichever device write
//! lands last (last-write-wins); this is accepted, not corrected. There is
//! no cancellation and no caller-side timeout: once issued, a device call
//! runs until it succeeds or fails.

use crate::device::{self, SharedDevice};
use crate::error::Result;
use crate::registry::Registry;
use hifi_common::events::{BroadcastEvent, DeviceState, PlaybackCommand, PlaybackStatus, Volume};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Caller-issued intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetVolume(Volume),
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Stop,
    GetState,
}

impl Command {
    /// Validate a raw volume into a `SetVolume` command
    ///
    /// Non-integers and values outside 0-100 are rejected with
    /// `InvalidArgument` before anything reaches the device.
    pub fn set_volume(raw: &Value) -> Result<Self> {
        Ok(Command::SetVolume(Volume::from_json(raw)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::SetVolume(_) => "SetVolume",
            Command::Play => "Play",
            Command::Pause => "Pause",
            Command::TogglePlayPause => "TogglePlayPause",
            Command::Next => "Next",
            Command::Previous => "Previous",
            Command::Stop => "Stop",
            Command::GetState => "GetState",
        }
    }
}

impl From<PlaybackCommand> for Command {
    fn from(command: PlaybackCommand) -> Self {
        match command {
            PlaybackCommand::Play => Command::Play,
            PlaybackCommand::Pause => Command::Pause,
            PlaybackCommand::Toggle => Command::TogglePlayPause,
            PlaybackCommand::Next => Command::Next,
            PlaybackCommand::Previous => Command::Previous,
            PlaybackCommand::Stop => Command::Stop,
        }
    }
}

/// Result reported to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Volume now set on the device
    Volume(Volume),
    /// Playback status after the command
    Playback(PlaybackStatus),
    /// Command applied, nothing specific to report
    Acknowledged,
    /// Snapshot for the caller alone
    State(DeviceState),
}

/// What one dispatch produced: the caller's result and the broadcast event
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub outcome: Outcome,
    pub event: Option<BroadcastEvent>,
}

impl Dispatched {
    fn new(outcome: Outcome, event: Option<BroadcastEvent>) -> Self {
        Self { outcome, event }
    }
}

/// Routes commands to the device and their results to subscribers
pub struct Dispatcher {
    device: SharedDevice,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(device: SharedDevice, registry: Arc<Registry>) -> Self {
        Self { device, registry }
    }

    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Run one command to completion, then broadcast its event
    ///
    /// On failure nothing is broadcast and the error is returned to the
    /// caller unchanged.
    pub async fn dispatch(&self, command: Command) -> Result<Dispatched> {
        let name = command.name();
        debug!("Dispatching {}", name);

        let dispatched = match self.execute(command).await {
            Ok(dispatched) => dispatched,
            Err(e) if e.is_device_error() => {
                warn!("{} failed at the device: {}", name, e);
                return Err(e);
            }
            Err(e) => {
                debug!("{} rejected: {}", name, e);
                return Err(e);
            }
        };

        if let Some(event) = &dispatched.event {
            let delivered = self.registry.broadcast(event).await;
            info!("{} applied, {} sent to {} subscriber(s)", name, event.tag(), delivered);
        } else {
            debug!("{} applied, nothing to broadcast", name);
        }

        Ok(dispatched)
    }

    async fn execute(&self, command: Command) -> Result<Dispatched> {
        match command {
            Command::SetVolume(volume) => {
                self.device.set_volume(volume).await?;
                Ok(Dispatched::new(
                    Outcome::Volume(volume),
                    Some(BroadcastEvent::VolumeChanged { volume }),
                ))
            }
            Command::Play => {
                self.device.play().await?;
                Ok(Self::playback(PlaybackStatus::Playing))
            }
            Command::Pause => {
                self.device.pause().await?;
                Ok(Self::playback(PlaybackStatus::Paused))
            }
            Command::TogglePlayPause => {
                let current = self.device.get_status().await?.status;
                let status = if current.is_playing() {
                    self.device.pause().await?;
                    PlaybackStatus::Paused
                } else {
                    self.device.play().await?;
                    PlaybackStatus::Playing
                };
                Ok(Self::playback(status))
            }
            Command::Next => {
                self.device.next().await?;
                Ok(self.acknowledged_with_snapshot("Next").await)
            }
            Command::Previous => {
                self.device.previous().await?;
                Ok(self.acknowledged_with_snapshot("Previous").await)
            }
            Command::Stop => {
                self.device.stop().await?;
                Ok(self.acknowledged_with_snapshot("Stop").await)
            }
            Command::GetState => {
                let state = device::snapshot(self.device.as_ref()).await?;
                Ok(Dispatched::new(Outcome::State(state), None))
            }
        }
    }

    fn playback(status: PlaybackStatus) -> Dispatched {
        Dispatched::new(
            Outcome::Playback(status.clone()),
            Some(BroadcastEvent::PlaybackChanged { status }),
        )
    }

    /// The command already succeeded; a failed re-read only skips the
    /// broadcast.
    async fn acknowledged_with_snapshot(&self, name: &str) -> Dispatched {
        match device::snapshot(self.device.as_ref()).await {
            Ok(state) => Dispatched::new(
                Outcome::Acknowledged,
                Some(BroadcastEvent::StateUpdate(state)),
            ),
            Err(e) => {
                warn!("{} applied but state re-read failed, skipping broadcast: {}", name, e);
                Dispatched::new(Outcome::Acknowledged, None)
            }
        }
    }
}
