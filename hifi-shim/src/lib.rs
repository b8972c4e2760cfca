//! # HiFi Shim Library (hifi-shim)
//!
//! Control-plane shim exposing one audio device's volume and playback state
//! over REST and WebSocket, keeping every connected viewer consistent.
//!
//! **Architecture:** device capability (`device`) -> command dispatcher
//! (`dispatcher`) -> client registry and broadcaster (`registry`), fronted by
//! an Axum server (`api`).

pub mod api;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod registry;

pub use dispatcher::{Command, Dispatcher, Outcome};
pub use error::{Error, Result};
pub use registry::Registry;
