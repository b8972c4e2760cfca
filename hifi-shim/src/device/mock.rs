//! In-memory device
//!
//! Behaves like a well-mannered player: transport commands update the
//! playback status, volume writes are read back unchanged. Every call is
//! counted, and failures can be injected per method, which makes the mock
//! the reference device for tests. It is also selectable at runtime with
//! `device.kind = "mock"`.

use super::AudioDevice;
use crate::error::{Error, Result};
use async_trait::async_trait;
use hifi_common::events::{DeviceStatus, PlaybackStatus, TrackInfo, Volume};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Device methods, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    GetVolume,
    SetVolume,
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    TogglePlayPause,
    GetStatus,
    GetTrack,
}

/// Number of invocations per device method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_volume: usize,
    pub set_volume: usize,
    pub play: usize,
    pub pause: usize,
    pub stop: usize,
    pub next: usize,
    pub previous: usize,
    pub toggle_play_pause: usize,
    pub get_status: usize,
    pub get_track: usize,
}

impl CallCounts {
    /// Calls that change device state
    pub fn mutations(&self) -> usize {
        self.set_volume
            + self.play
            + self.pause
            + self.stop
            + self.next
            + self.previous
            + self.toggle_play_pause
    }

    fn record(&mut self, call: MockCall) {
        let counter = match call {
            MockCall::GetVolume => &mut self.get_volume,
            MockCall::SetVolume => &mut self.set_volume,
            MockCall::Play => &mut self.play,
            MockCall::Pause => &mut self.pause,
            MockCall::Stop => &mut self.stop,
            MockCall::Next => &mut self.next,
            MockCall::Previous => &mut self.previous,
            MockCall::TogglePlayPause => &mut self.toggle_play_pause,
            MockCall::GetStatus => &mut self.get_status,
            MockCall::GetTrack => &mut self.get_track,
        };
        *counter += 1;
    }
}

#[derive(Debug)]
struct Inner {
    volume: Volume,
    status: PlaybackStatus,
    track: Option<TrackInfo>,
    calls: CallCounts,
    fail_all: bool,
    fail_on: HashSet<MockCall>,
}

/// In-memory [`AudioDevice`]
#[derive(Debug)]
pub struct MockDevice {
    inner: Mutex<Inner>,
}

impl MockDevice {
    /// Paused at volume 50, nothing loaded
    pub fn new() -> Self {
        Self::with_state(Volume::saturating(50), PlaybackStatus::Paused)
    }

    pub fn with_state(volume: Volume, status: PlaybackStatus) -> Self {
        Self {
            inner: Mutex::new(Inner {
                volume,
                status,
                track: None,
                calls: CallCounts::default(),
                fail_all: false,
                fail_on: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Invocation counts so far
    pub fn calls(&self) -> CallCounts {
        self.lock().calls.clone()
    }

    /// Make every call fail with `DeviceUnreachable`
    pub fn set_failing(&self, failing: bool) {
        self.lock().fail_all = failing;
    }

    /// Make one method fail with `DeviceUnreachable`
    pub fn fail_on(&self, call: MockCall) {
        self.lock().fail_on.insert(call);
    }

    /// Clear all injected failures
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.fail_all = false;
        inner.fail_on.clear();
    }

    pub fn set_track(&self, track: Option<TrackInfo>) {
        self.lock().track = track;
    }

    /// Current volume, without counting a call
    pub fn volume(&self) -> Volume {
        self.lock().volume
    }

    /// Current status, without counting a call
    pub fn status(&self) -> PlaybackStatus {
        self.lock().status.clone()
    }

    /// Count the call and apply `f` unless a failure is injected
    fn invoke<T>(&self, call: MockCall, f: impl FnOnce(&mut Inner) -> T) -> Result<T> {
        let mut inner = self.lock();
        inner.calls.record(call);
        if inner.fail_all || inner.fail_on.contains(&call) {
            debug!("Mock device failing {:?}", call);
            return Err(Error::DeviceUnreachable(format!(
                "mock device failure on {:?}",
                call
            )));
        }
        Ok(f(&mut inner))
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioDevice for MockDevice {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_volume(&self) -> Result<Volume> {
        self.invoke(MockCall::GetVolume, |inner| inner.volume)
    }

    async fn set_volume(&self, volume: Volume) -> Result<()> {
        self.invoke(MockCall::SetVolume, |inner| inner.volume = volume)
    }

    async fn play(&self) -> Result<()> {
        self.invoke(MockCall::Play, |inner| inner.status = PlaybackStatus::Playing)
    }

    async fn pause(&self) -> Result<()> {
        self.invoke(MockCall::Pause, |inner| inner.status = PlaybackStatus::Paused)
    }

    async fn stop(&self) -> Result<()> {
        self.invoke(MockCall::Stop, |inner| inner.status = PlaybackStatus::Stopped)
    }

    async fn next(&self) -> Result<()> {
        self.invoke(MockCall::Next, |inner| inner.status = PlaybackStatus::Playing)
    }

    async fn previous(&self) -> Result<()> {
        self.invoke(MockCall::Previous, |inner| inner.status = PlaybackStatus::Playing)
    }

    async fn toggle_play_pause(&self) -> Result<()> {
        self.invoke(MockCall::TogglePlayPause, |inner| {
            inner.status = if inner.status.is_playing() {
                PlaybackStatus::Paused
            } else {
                PlaybackStatus::Playing
            };
        })
    }

    async fn get_status(&self) -> Result<DeviceStatus> {
        self.invoke(MockCall::GetStatus, |inner| DeviceStatus::new(inner.status.clone()))
    }

    async fn get_track(&self) -> Result<Option<TrackInfo>> {
        self.invoke(MockCall::GetTrack, |inner| inner.track.clone())
    }
}
