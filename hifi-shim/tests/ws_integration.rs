//! Push channel tests over a real WebSocket connection
//!
//! Serves the full router on an ephemeral port and talks to `/ws` with a
//! WebSocket client, covering join, replies, fan-out and disconnect.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use hifi_common::events::{PlaybackStatus, Volume};
use hifi_shim::api::{create_router, AppContext};
use hifi_shim::device::mock::MockDevice;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server(volume: i64, status: PlaybackStatus) -> (String, Arc<MockDevice>, AppContext) {
    let device = Arc::new(MockDevice::with_state(Volume::new(volume).unwrap(), status));
    let ctx = AppContext::new(device.clone());
    let app = create_router(ctx.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}/ws", addr), device, ctx)
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.unwrap();
    client
}

/// Next text frame as JSON; panics on timeout or end of stream
async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(_) => panic!("connection closed"),
            _ => continue,
        }
    }
}

async fn send_json(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}

/// Wait until the registry holds exactly `expected` subscribers
async fn wait_for_subscribers(ctx: &AppContext, expected: usize) {
    for _ in 0..100 {
        if ctx.registry().len().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "expected {} subscriber(s), found {}",
        expected,
        ctx.registry().len().await
    );
}

#[tokio::test]
async fn test_join_receives_state_update_first() {
    let (url, _, ctx) = start_server(40, PlaybackStatus::Paused).await;

    let mut client = connect(&url).await;
    let first = next_json(&mut client).await;

    assert_eq!(first["type"], "STATE_UPDATE");
    assert_eq!(first["payload"]["volume"], 40);
    assert_eq!(first["payload"]["status"], "paused");
    wait_for_subscribers(&ctx, 1).await;
}

#[tokio::test]
async fn test_session_round_trip() {
    let (url, device, ctx) = start_server(40, PlaybackStatus::Paused).await;

    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    assert_eq!(next_json(&mut a).await["type"], "STATE_UPDATE");
    assert_eq!(next_json(&mut b).await["type"], "STATE_UPDATE");
    wait_for_subscribers(&ctx, 2).await;

    // Malformed frame: error to the sender only
    send_json(&mut a, "{not json").await;
    let reply = next_json(&mut a).await;
    assert_eq!(reply["type"], "ERROR");
    assert!(reply["payload"]["message"].is_string());

    // Binary frames are refused the same way
    a.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    assert_eq!(next_json(&mut a).await["type"], "ERROR");

    // A command from A reaches both; B's first frame after join is the change
    send_json(&mut a, r#"{"type":"PLAYBACK_CONTROL","payload":{"command":"PLAY"}}"#).await;
    for client in [&mut a, &mut b] {
        let event = next_json(client).await;
        assert_eq!(event["type"], "PLAYBACK_CHANGED");
        assert_eq!(event["payload"]["status"], "playing");
    }
    assert_eq!(device.calls().play, 1);

    send_json(&mut b, r#"{"type":"SET_VOLUME","payload":{"volume":55}}"#).await;
    for client in [&mut a, &mut b] {
        let event = next_json(client).await;
        assert_eq!(event["type"], "VOLUME_CHANGED");
        assert_eq!(event["payload"]["volume"], 55);
    }

    send_json(&mut b, r#"{"type":"GET_STATE"}"#).await;
    let state = next_json(&mut b).await;
    assert_eq!(state["type"], "STATE_UPDATE");
    assert_eq!(state["payload"]["volume"], 55);
    assert_eq!(state["payload"]["status"], "playing");

    a.close(None).await.unwrap();
    wait_for_subscribers(&ctx, 1).await;

    b.close(None).await.unwrap();
    wait_for_subscribers(&ctx, 0).await;
}

#[tokio::test]
async fn test_closed_registry_refuses_new_connections() {
    let (url, device, ctx) = start_server(40, PlaybackStatus::Paused).await;
    ctx.registry().close().await;

    let mut client = connect(&url).await;
    let _ = client
        .send(Message::Text(
            r#"{"type":"PLAYBACK_CONTROL","payload":{"command":"PLAY"}}"#.to_string(),
        ))
        .await;

    // The server closes without a state update and never reads the command
    loop {
        match tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Text(text))) => panic!("unexpected frame {}", text),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => continue,
        }
    }

    assert_eq!(device.calls().play, 0);
    assert!(ctx.registry().is_empty().await);
}
