//! REST and WebSocket surface
//!
//! Both transports funnel state changes through the dispatcher.

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{create_router, run, AppContext};
