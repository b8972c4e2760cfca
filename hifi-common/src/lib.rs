//! # HiFi Shim Common Library
//!
//! Shared code for the HiFi control shim including:
//! - Wire protocol for the push channel (`events`)
//! - Playback value types (volume, status, track, state snapshot)
//! - Bootstrap configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{DeviceState, PlaybackStatus, TrackInfo, Volume};
