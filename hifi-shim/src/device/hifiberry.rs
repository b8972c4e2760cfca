//! HifiBerry device adapter
//!
//! Drives a HifiBerry OS box through its AudioControl REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | volume | `GET/POST /api/volume` |
//! | transport | `POST /api/player/{play,pause,stop,next,previous,playpause}` |
//! | status | `GET /api/player/status` |
//! | track | `GET /api/track/metadata` |
//!
//! Failures are classified as:
//! - connect/transport failure: `DeviceUnreachable`
//! - non-2xx on a write: `DeviceRejected`
//! - non-2xx or unparsable body on a read: `DeviceProtocolError`

use super::AudioDevice;
use crate::error::{Error, Result};
use async_trait::async_trait;
use hifi_common::config::DeviceConfig;
use hifi_common::events::{DeviceStatus, PlaybackStatus, TrackInfo, Volume};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP-backed [`AudioDevice`]
#[derive(Debug, Clone)]
pub struct HifiBerryDevice {
    client: reqwest::Client,
    base_url: String,
}

impl HifiBerryDevice {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_millis(config.connect_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| Error::DeviceUnreachable(format!("GET {}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DeviceProtocolError(format!(
                "GET {} returned {}",
                path, status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::DeviceProtocolError(format!("GET {}: invalid body: {}", path, e)))
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<()> {
        debug!("POST {}", path);
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::DeviceUnreachable(format!("POST {}: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Device rejected POST {}: {}", path, status);
            return Err(Error::DeviceRejected(format!(
                "POST {} returned {}",
                path, status
            )));
        }
        Ok(())
    }
}

/// Extract the volume from a `/api/volume` body
///
/// Accepts `{"volume": n}` as well as AudioControl's `{"percent": n}`.
fn parse_volume(body: &Value) -> Result<Volume> {
    let raw = body
        .get("volume")
        .or_else(|| body.get("percent"))
        .ok_or_else(|| Error::DeviceProtocolError(format!("No volume in {}", body)))?;

    let value = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
    .ok_or_else(|| Error::DeviceProtocolError(format!("Volume is not a number: {}", raw)))?;

    Volume::new(value).map_err(|e| Error::DeviceProtocolError(e.to_string()))
}

/// Fields that must never leak into the pass-through part of a status
const RESERVED_FIELDS: &[&str] = &["status", "state", "volume"];

fn status_from_object(object: &Map<String, Value>) -> Option<DeviceStatus> {
    let raw = object
        .get("status")
        .or_else(|| object.get("state"))
        .and_then(Value::as_str)?;

    let extra = object
        .iter()
        .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(DeviceStatus {
        status: PlaybackStatus::from_vendor(raw),
        extra,
    })
}

/// Extract the playback status from a `/api/player/status` body
///
/// AudioControl reports `{"players": [{"name": .., "state": ..}, ..]}`; the
/// first playing player wins, otherwise the first listed one. A flat
/// `{"status": ..}` or `{"state": ..}` object is accepted as well.
fn parse_status(body: &Value) -> Result<DeviceStatus> {
    if let Some(players) = body.get("players").and_then(Value::as_array) {
        let objects: Vec<&Map<String, Value>> =
            players.iter().filter_map(Value::as_object).collect();

        let chosen = objects
            .iter()
            .find(|p| {
                p.get("state")
                    .or_else(|| p.get("status"))
                    .and_then(Value::as_str)
                    .map(|s| PlaybackStatus::from_vendor(s).is_playing())
                    .unwrap_or(false)
            })
            .or_else(|| objects.first());

        return match chosen {
            Some(player) => status_from_object(player).ok_or_else(|| {
                Error::DeviceProtocolError("Player entry without state".to_string())
            }),
            None => Ok(DeviceStatus::new(PlaybackStatus::Stopped)),
        };
    }

    body.as_object()
        .and_then(status_from_object)
        .ok_or_else(|| Error::DeviceProtocolError(format!("No playback status in {}", body)))
}

/// Extract track metadata from a `/api/track/metadata` body
fn parse_track(body: Value) -> Result<Option<TrackInfo>> {
    match body {
        Value::Null => Ok(None),
        Value::Object(ref map) if map.is_empty() => Ok(None),
        Value::Object(_) => {
            let track: TrackInfo = serde_json::from_value(body)
                .map_err(|e| Error::DeviceProtocolError(format!("Invalid track metadata: {}", e)))?;
            if track.title.is_none() && track.artist.is_none() && track.album.is_none() {
                Ok(None)
            } else {
                Ok(Some(track))
            }
        }
        other => Err(Error::DeviceProtocolError(format!(
            "Invalid track metadata: {}",
            other
        ))),
    }
}

#[async_trait]
impl AudioDevice for HifiBerryDevice {
    fn name(&self) -> &str {
        "hifiberry"
    }

    async fn get_volume(&self) -> Result<Volume> {
        let body = self.get_json("/api/volume").await?;
        parse_volume(&body)
    }

    async fn set_volume(&self, volume: Volume) -> Result<()> {
        self.post("/api/volume", Some(json!({ "volume": volume })))
            .await
    }

    async fn play(&self) -> Result<()> {
        self.post("/api/player/play", None).await
    }

    async fn pause(&self) -> Result<()> {
        self.post("/api/player/pause", None).await
    }

    async fn stop(&self) -> Result<()> {
        self.post("/api/player/stop", None).await
    }

    async fn next(&self) -> Result<()> {
        self.post("/api/player/next", None).await
    }

    async fn previous(&self) -> Result<()> {
        self.post("/api/player/previous", None).await
    }

    async fn toggle_play_pause(&self) -> Result<()> {
        self.post("/api/player/playpause", None).await
    }

    async fn get_status(&self) -> Result<DeviceStatus> {
        let body = self.get_json("/api/player/status").await?;
        parse_status(&body)
    }

    async fn get_track(&self) -> Result<Option<TrackInfo>> {
        let body = self.get_json("/api/track/metadata").await?;
        parse_track(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volume_variants() {
        assert_eq!(parse_volume(&json!({ "volume": 40 })).unwrap().get(), 40);
        assert_eq!(parse_volume(&json!({ "percent": 72.6 })).unwrap().get(), 73);
        assert_eq!(parse_volume(&json!({ "volume": "15" })).unwrap().get(), 15);
    }

    #[test]
    fn test_parse_volume_rejects_garbage() {
        assert!(matches!(
            parse_volume(&json!({})),
            Err(Error::DeviceProtocolError(_))
        ));
        assert!(matches!(
            parse_volume(&json!({ "volume": 140 })),
            Err(Error::DeviceProtocolError(_))
        ));
        assert!(matches!(
            parse_volume(&json!({ "volume": [1] })),
            Err(Error::DeviceProtocolError(_))
        ));
    }

    #[test]
    fn test_parse_status_players_list() {
        let body = json!({
            "players": [
                { "name": "spotify", "state": "paused" },
                { "name": "mpd", "state": "playing", "volume": 10 }
            ]
        });
        let status = parse_status(&body).unwrap();
        assert_eq!(status.status, PlaybackStatus::Playing);
        assert_eq!(status.extra["name"], "mpd");
        assert!(!status.extra.contains_key("volume"));
        assert!(!status.extra.contains_key("state"));
    }

    #[test]
    fn test_parse_status_falls_back_to_first_player() {
        let body = json!({ "players": [{ "name": "spotify", "state": "paused" }] });
        assert_eq!(parse_status(&body).unwrap().status, PlaybackStatus::Paused);

        let body = json!({ "players": [] });
        assert_eq!(parse_status(&body).unwrap().status, PlaybackStatus::Stopped);
    }

    #[test]
    fn test_parse_status_flat_object() {
        let status = parse_status(&json!({ "status": "playing", "source": "airplay" })).unwrap();
        assert_eq!(status.status, PlaybackStatus::Playing);
        assert_eq!(status.extra["source"], "airplay");

        assert!(parse_status(&json!({ "foo": 1 })).is_err());
        assert!(parse_status(&json!("playing")).is_err());
    }

    #[test]
    fn test_parse_track() {
        assert_eq!(parse_track(Value::Null).unwrap(), None);
        assert_eq!(parse_track(json!({})).unwrap(), None);
        assert_eq!(parse_track(json!({ "playerName": "mpd" })).unwrap(), None);

        let track = parse_track(json!({
            "title": "So What",
            "artist": "Miles Davis",
            "artUrl": "http://box/cover.jpg"
        }))
        .unwrap()
        .unwrap();
        assert_eq!(track.title.as_deref(), Some("So What"));
        assert_eq!(track.art_url.as_deref(), Some("http://box/cover.jpg"));

        assert!(parse_track(json!(42)).is_err());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let device = HifiBerryDevice::new("http://box:81/", Duration::from_secs(1)).unwrap();
        assert_eq!(device.base_url(), "http://box:81");
        assert_eq!(device.url("/api/volume"), "http://box:81/api/volume");
    }
}
