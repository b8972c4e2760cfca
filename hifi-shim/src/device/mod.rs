//! Device capability
//!
//! [`AudioDevice`] is the contract every controllable player satisfies.
//! Exactly one implementation is active per process, chosen at startup from
//! configuration by [`from_config`].
//!
//! Implementations hold no cached device state: the device is the source of
//! truth, and a failed call leaves nothing behind in this layer.

pub mod hifiberry;
pub mod mock;

pub use hifiberry::HifiBerryDevice;
pub use mock::MockDevice;

use crate::error::Result;
use async_trait::async_trait;
use hifi_common::config::{DeviceConfig, DeviceKind};
use hifi_common::events::{DeviceState, DeviceStatus, TrackInfo, Volume};
use std::sync::Arc;
use tracing::info;

/// Controllable audio device
///
/// Every method may block on I/O. Transport controls are idempotent from
/// the caller's side: `play()` while already playing is not an error.
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Short adapter name for logs
    fn name(&self) -> &str;

    async fn get_volume(&self) -> Result<Volume>;

    /// Set the device volume. No confirmation is returned; re-query with
    /// [`AudioDevice::get_volume`] if needed.
    async fn set_volume(&self, volume: Volume) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn next(&self) -> Result<()>;

    async fn previous(&self) -> Result<()>;

    async fn toggle_play_pause(&self) -> Result<()>;

    async fn get_status(&self) -> Result<DeviceStatus>;

    /// Metadata of the current track, if anything is loaded
    async fn get_track(&self) -> Result<Option<TrackInfo>>;

    /// Artwork reference of the current track
    async fn get_artwork(&self) -> Result<Option<String>> {
        Ok(self.get_track().await?.and_then(|track| track.art_url))
    }
}

/// Shared handle to the process-wide device
pub type SharedDevice = Arc<dyn AudioDevice>;

/// Read volume and status concurrently into a full snapshot
pub async fn snapshot(device: &dyn AudioDevice) -> Result<DeviceState> {
    let (volume, status) = tokio::try_join!(device.get_volume(), device.get_status())?;
    Ok(DeviceState::new(volume, status))
}

/// Build the device adapter selected by configuration
pub fn from_config(config: &DeviceConfig) -> Result<SharedDevice> {
    let device: SharedDevice = match config.kind {
        DeviceKind::HifiBerry => Arc::new(HifiBerryDevice::from_config(config)?),
        DeviceKind::Mock => Arc::new(MockDevice::new()),
    };
    info!("Using {} device adapter", device.name());
    Ok(device)
}
