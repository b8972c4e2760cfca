//! Client registry and broadcaster
//!
//! Owns the set of live push subscribers. Each subscriber is the sending half
//! of a per-connection channel; the connection's writer task owns the
//! receiving half and forwards frames to the socket. When a connection goes
//! away its receiver is dropped, the next send to it fails, and the
//! subscriber is pruned.
//!
//! Each subscriber queue is bounded. A connection that stops draining fills
//! its queue, the next send fails, and it is pruned like a closed one.
//!
//! Broadcasts work on a snapshot of the registry taken at call time.
//! Subscribers that join or leave mid-broadcast may miss that broadcast;
//! the next broadcast or `GET_STATE` reconciles them.

use crate::device::{self, SharedDevice};
use crate::error::{Error, Result};
use hifi_common::events::BroadcastEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identifier of one push connection
pub type SubscriberId = Uuid;

/// Serialized frame delivered to a connection
pub type Frame = Arc<str>;

/// Receiving half of a subscriber, owned by the connection's writer
pub type FrameReceiver = mpsc::Receiver<Frame>;

/// Frames a subscriber may have queued before it counts as stalled
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// One open push connection
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Frame>,
}

impl Subscriber {
    /// Create a subscriber and the receiver its connection drains
    pub fn new() -> (Self, FrameReceiver) {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// False once the connection side has gone away
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, frame: Frame) -> Result<()> {
        try_send(self.id, &self.tx, frame)
    }
}

/// Queue a frame without waiting; a full or closed queue means the
/// connection is lost
fn try_send(id: SubscriberId, tx: &mpsc::Sender<Frame>, frame: Frame) -> Result<()> {
    tx.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => {
            warn!("Subscriber {} stalled, queue full", id);
            Error::ConnectionLost(format!("{} (queue full)", id))
        }
        TrySendError::Closed(_) => Error::ConnectionLost(id.to_string()),
    })
}

/// Registry of live subscribers
///
/// Created at startup, shared by the dispatcher and the connection
/// acceptance path, and closed at shutdown.
pub struct Registry {
    device: SharedDevice,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    closed: AtomicBool,
}

impl Registry {
    pub fn new(device: SharedDevice) -> Self {
        Self {
            device,
            subscribers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Add a subscriber and send it a fresh `STATE_UPDATE`
    ///
    /// The snapshot is read before the subscriber joins, so the state update
    /// is always the first frame it sees. If the snapshot cannot be read the
    /// subscriber still joins and receives an `ERROR` instead.
    ///
    /// Fails with `ConnectionLost` when the registry is closed or the
    /// connection went away before joining; the subscriber is not added.
    pub async fn register(&self, subscriber: Subscriber) -> Result<SubscriberId> {
        let id = subscriber.id();

        let initial = match device::snapshot(self.device.as_ref()).await {
            Ok(state) => BroadcastEvent::StateUpdate(state),
            Err(e) => {
                warn!("Failed to read initial state for {}: {}", id, e);
                BroadcastEvent::error(e.to_string())
            }
        };

        let mut subscribers = self.subscribers.write().await;
        if self.closed.load(Ordering::Acquire) {
            warn!("Registry closed, dropping subscriber {}", id);
            return Err(Error::ConnectionLost(format!("{} (registry closed)", id)));
        }

        match initial.to_json() {
            Ok(json) => {
                if let Err(e) = subscriber.send(json.into()) {
                    debug!("Subscriber {} disconnected before joining", id);
                    return Err(e);
                }
            }
            Err(e) => error!("Failed to serialize initial state: {}", e),
        }

        subscribers.insert(id, subscriber);
        info!("Subscriber {} registered ({} connected)", id, subscribers.len());
        Ok(id)
    }

    /// Remove a subscriber; removing an unknown one is a no-op
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            info!("Subscriber {} unregistered", id);
        }
        removed
    }

    /// Send an event to every open subscriber
    ///
    /// The event is serialized once. A failed send, including one to a
    /// subscriber whose queue is full, only removes that subscriber. Returns the number of subscribers that received it.
    pub async fn broadcast(&self, event: &BroadcastEvent) -> usize {
        let frame: Frame = match event.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.tag(), e);
                return 0;
            }
        };

        let mut dead = Vec::new();
        let targets: Vec<(SubscriberId, mpsc::Sender<Frame>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .values()
                .filter_map(|s| {
                    if s.is_open() {
                        Some((s.id, s.tx.clone()))
                    } else {
                        dead.push(s.id);
                        None
                    }
                })
                .collect()
        };

        let mut delivered = 0;
        for (id, tx) in targets {
            if try_send(id, &tx, Arc::clone(&frame)).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        self.prune(dead).await;
        debug!("Broadcast {} to {} subscriber(s)", event.tag(), delivered);
        delivered
    }

    /// Send an event to one subscriber only
    pub async fn send_to(&self, id: SubscriberId, event: &BroadcastEvent) -> Result<()> {
        let frame: Frame = event.to_json()?.into();

        let result = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(&id) {
                Some(subscriber) => subscriber.send(frame),
                None => return Err(Error::ConnectionLost(id.to_string())),
            }
        };

        if result.is_err() {
            self.prune(vec![id]).await;
        }
        result
    }

    /// Number of registered subscribers
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    /// Drop every subscriber and refuse new ones
    ///
    /// Dropping the senders ends each connection's writer, which closes the
    /// socket.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len();
        subscribers.clear();
        info!("Registry closed, {} subscriber(s) disconnected", count);
    }

    async fn prune(&self, dead: Vec<SubscriberId>) {
        if dead.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.write().await;
        for id in dead {
            if subscribers.remove(&id).is_some() {
                info!("Subscriber {} pruned after failed send", id);
            }
        }
    }
}
