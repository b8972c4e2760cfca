//! Error types for hifi-shim
//!
//! Device failures are explicit error kinds so the dispatcher can tell
//! "nothing changed" apart from "changed, but the follow-up read failed".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for hifi-shim
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied value out of contract; never reaches the device
    #[error("{0}")]
    InvalidArgument(String),

    /// Device could not be reached (connect or transport failure)
    #[error("Device unreachable: {0}")]
    DeviceUnreachable(String),

    /// Device answered with something that could not be understood
    #[error("Device protocol error: {0}")]
    DeviceProtocolError(String),

    /// Device refused the command
    #[error("Device rejected command: {0}")]
    DeviceRejected(String),

    /// A subscriber's connection is gone
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using hifi-shim Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status reported to REST callers
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::DeviceUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::DeviceProtocolError(_) | Error::DeviceRejected(_) => StatusCode::BAD_GATEWAY,
            Error::ConnectionLost(_)
            | Error::Config(_)
            | Error::Http(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures that originate at the device
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Error::DeviceUnreachable(_) | Error::DeviceProtocolError(_) | Error::DeviceRejected(_)
        )
    }
}

impl From<hifi_common::Error> for Error {
    fn from(err: hifi_common::Error) -> Self {
        match err {
            hifi_common::Error::InvalidInput(msg) => Error::InvalidArgument(msg),
            hifi_common::Error::Config(msg) => Error::Config(msg),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
