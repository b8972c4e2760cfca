//! HTTP request handlers
//!
//! State-changing endpoints go through the dispatcher, so a REST call
//! broadcasts exactly like the equivalent push message. Read-only endpoints
//! query the device directly.

use crate::api::server::AppContext;
use crate::dispatcher::{Command, Outcome};
use crate::error::{Error, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use hifi_common::events::{self, DeviceState, DeviceStatus, PlaybackStatus, TrackInfo, Volume};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    device: String,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: Volume,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    status: PlaybackStatus,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    track: Option<TrackInfo>,
}

#[derive(Debug, Serialize)]
pub struct ArtworkResponse {
    artwork: Option<String>,
}

fn unexpected(outcome: Outcome) -> Error {
    Error::Internal(format!("Unexpected dispatch outcome: {:?}", outcome))
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "hifi-shim".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        device: ctx.device().name().to_string(),
    })
}

// ============================================================================
// Status Endpoints
// ============================================================================

/// GET /api/status - Current device status
pub async fn get_status(State(ctx): State<AppContext>) -> Result<Json<DeviceStatus>> {
    Ok(Json(ctx.device().get_status().await?))
}

/// GET /api/state - Full snapshot, same shape as `STATE_UPDATE`
pub async fn get_state(State(ctx): State<AppContext>) -> Result<Json<DeviceState>> {
    match ctx.dispatcher.dispatch(Command::GetState).await?.outcome {
        Outcome::State(state) => Ok(Json(state)),
        other => Err(unexpected(other)),
    }
}

/// GET /api/track - Current track metadata
pub async fn get_track(State(ctx): State<AppContext>) -> Result<Json<TrackResponse>> {
    let track = ctx.device().get_track().await?;
    Ok(Json(TrackResponse { track }))
}

/// GET /api/artwork - Artwork reference of the current track
pub async fn get_artwork(State(ctx): State<AppContext>) -> Result<Json<ArtworkResponse>> {
    let artwork = ctx.device().get_artwork().await?;
    Ok(Json(ArtworkResponse { artwork }))
}

/// GET /api/ws/types - Push channel message catalog
pub async fn ws_types() -> Json<Value> {
    Json(events::message_catalog())
}

// ============================================================================
// Volume Endpoints
// ============================================================================

/// GET /api/volume - Current volume
pub async fn get_volume(State(ctx): State<AppContext>) -> Result<Json<VolumeResponse>> {
    let volume = ctx.device().get_volume().await?;
    Ok(Json(VolumeResponse { volume }))
}

/// POST /api/volume - Set volume, body `{"volume": 0-100}`
///
/// Anything but an integer in range is a 400 and never reaches the device.
pub async fn set_volume(
    State(ctx): State<AppContext>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<VolumeResponse>> {
    let Json(body) = body.map_err(|rejection| Error::InvalidArgument(rejection.body_text()))?;
    let command = Command::set_volume(body.get("volume").unwrap_or(&Value::Null))?;

    match ctx.dispatcher.dispatch(command).await?.outcome {
        Outcome::Volume(volume) => {
            info!("Volume set to {}", volume);
            Ok(Json(VolumeResponse { volume }))
        }
        other => Err(unexpected(other)),
    }
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

async fn playback(ctx: &AppContext, command: Command) -> Result<Json<PlaybackResponse>> {
    match ctx.dispatcher.dispatch(command).await?.outcome {
        Outcome::Playback(status) => Ok(Json(PlaybackResponse { status })),
        other => Err(unexpected(other)),
    }
}

/// POST /api/player/play
pub async fn play(State(ctx): State<AppContext>) -> Result<Json<PlaybackResponse>> {
    playback(&ctx, Command::Play).await
}

/// POST /api/player/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<PlaybackResponse>> {
    playback(&ctx, Command::Pause).await
}

/// POST /api/player/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> Result<Json<PlaybackResponse>> {
    playback(&ctx, Command::TogglePlayPause).await
}

/// POST /api/player/next
pub async fn next(State(ctx): State<AppContext>) -> Result<StatusCode> {
    ctx.dispatcher.dispatch(Command::Next).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/player/previous
pub async fn previous(State(ctx): State<AppContext>) -> Result<StatusCode> {
    ctx.dispatcher.dispatch(Command::Previous).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/player/stop
pub async fn stop(State(ctx): State<AppContext>) -> Result<StatusCode> {
    ctx.dispatcher.dispatch(Command::Stop).await?;
    Ok(StatusCode::NO_CONTENT)
}
