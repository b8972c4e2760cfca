//! WebSocket push channel
//!
//! Each connection becomes one registry subscriber. A writer task drains the
//! subscriber's frames into the socket; the reader handles inbound messages
//! one at a time, each dispatched to completion before the next is read.
//!
//! Inbound messages never broadcast errors: parse failures, unknown tags,
//! invalid arguments and device failures are answered with an `ERROR` to the
//! sender only. A successful mutation needs no direct reply because the
//! sender also receives the broadcast.

use crate::api::server::AppContext;
use crate::dispatcher::{Command, Dispatcher, Outcome};
use crate::registry::{SubscriberId, Subscriber};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use hifi_common::events::{BroadcastEvent, ClientMessage};
use std::sync::Arc;
use tracing::{debug, warn};

/// GET /ws - Upgrade to the push channel
pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx.dispatcher))
}

async fn handle_socket(socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let (mut sink, mut stream) = socket.split();
    let (subscriber, mut frames) = Subscriber::new();
    let registry = Arc::clone(dispatcher.registry());
    let id = match registry.register(subscriber).await {
        Ok(id) => id,
        Err(e) => {
            debug!("Push connection refused: {}", e);
            let _ = sink.close().await;
            return;
        }
    };

    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                debug!("Send to {} failed: {}", id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_text(&dispatcher, id, &text).await,
            Ok(Message::Binary(_)) => {
                reply(&dispatcher, id, BroadcastEvent::error("Binary frames are not supported"))
                    .await
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Receive from {} failed: {}", id, e);
                break;
            }
        }
    }

    registry.unregister(id).await;
    if let Err(e) = writer.await {
        warn!("Writer task for {} ended abnormally: {}", id, e);
    }
}

/// Handle one inbound text frame from `from`
pub async fn handle_text(dispatcher: &Dispatcher, from: SubscriberId, text: &str) {
    if let Some(event) = process_message(dispatcher, text).await {
        reply(dispatcher, from, event).await;
    }
}

/// Run one inbound message and return the direct reply, if any
///
/// `GET_STATE` replies with `STATE_UPDATE`; failures reply with `ERROR`;
/// successful mutations reply with nothing.
pub async fn process_message(dispatcher: &Dispatcher, text: &str) -> Option<BroadcastEvent> {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Rejected inbound message: {}", e);
            return Some(BroadcastEvent::error(e.to_string()));
        }
    };

    let command = match message {
        ClientMessage::SetVolume { volume } => match Command::set_volume(&volume) {
            Ok(command) => command,
            Err(e) => return Some(BroadcastEvent::error(e.to_string())),
        },
        ClientMessage::PlaybackControl { command } => Command::from(command),
        ClientMessage::GetState => Command::GetState,
    };

    match dispatcher.dispatch(command).await {
        Ok(dispatched) => match dispatched.outcome {
            Outcome::State(state) => Some(BroadcastEvent::StateUpdate(state)),
            _ => None,
        },
        Err(e) => Some(BroadcastEvent::error(e.to_string())),
    }
}

async fn reply(dispatcher: &Dispatcher, to: SubscriberId, event: BroadcastEvent) {
    if let Err(e) = dispatcher.registry().send_to(to, &event).await {
        debug!("Reply {} not delivered: {}", event.tag(), e);
    }
}
