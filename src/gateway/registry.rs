//! Connection registry - the live table of room connections.
//!
//! Maps `(roomType, roomId, userId)` to the connection's outbound handle
//! plus a last-activity timestamp. Exactly one live connection may exist
//! per key: registering over an existing key returns the prior handle so
//! the caller can force-close it (supersession).
//!
//! # Thread Safety
//!
//! The map is sharded by room key hash so unrelated rooms never contend
//! on one lock; thousands of connections across rooms touch different
//! shards. All members of one room land in the same shard, which keeps
//! `snapshot` and `fan_out` a single lock acquisition.
//!
//! # Backpressure
//!
//! Each connection owns one bounded outbound queue (`tokio::sync::mpsc`).
//! The queue is an overflow signal, not guaranteed delivery storage: when
//! it is full the event is dropped for that connection with a logged
//! signal and a metric, and the sender is never blocked.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{RoomKey, UserId};
use crate::observability::metrics as m;

const SHARD_COUNT: usize = 16;

/// One outbound unit queued toward a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// A JSON envelope, already serialized.
    Text(String),

    /// Application-level heartbeat ping.
    Ping,

    /// Close the socket with an application close code.
    Close { code: u16, reason: &'static str },
}

/// Why a frame could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The outbound queue is at capacity; the connection is degraded and
    /// the frame was dropped.
    #[error("outbound queue full, frame dropped")]
    QueueFull,

    /// The writer task is gone; the connection is closing.
    #[error("connection closed")]
    Closed,
}

/// Cloneable sending side of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: Uuid,
    tx: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    /// Creates a handle with a bounded queue of `capacity` frames,
    /// returning the receiver for the connection's writer task.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                connection_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    /// The per-socket id, unique across supersessions of the same key.
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Queues a frame without blocking. A full queue drops the frame.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Best-effort close signal toward the writer task.
    pub fn close(&self, code: u16, reason: &'static str) {
        let _ = self.send(OutboundFrame::Close { code, reason });
    }

    /// Whether the writer task has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The registry key: one live connection per `(room, user)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub room: RoomKey,
    pub user_id: UserId,
}

impl ConnectionKey {
    pub fn new(room: RoomKey, user_id: UserId) -> Self {
        Self { room, user_id }
    }
}

#[derive(Debug)]
struct Entry {
    handle: ConnectionHandle,
    last_activity: Instant,
}

/// Outcome of a room fan-out, for logging and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Sharded table of live connections.
///
/// The single source of truth for "is this user currently connected to
/// this room"; every other component queries it rather than maintaining
/// its own copy.
#[derive(Debug)]
pub struct ConnectionRegistry {
    shards: Vec<RwLock<HashMap<ConnectionKey, Entry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard_for(&self, room: &RoomKey) -> &RwLock<HashMap<ConnectionKey, Entry>> {
        let mut hasher = DefaultHasher::new();
        room.hash(&mut hasher);
        // SHARD_COUNT is non-zero so the index is always in range.
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Installs the connection, returning any prior handle for the same
    /// key so the caller can force-close it.
    pub async fn register(
        &self,
        key: ConnectionKey,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let mut shard = self.shard_for(&key.room).write().await;
        let superseded = shard.insert(
            key,
            Entry {
                handle,
                last_activity: Instant::now(),
            },
        );
        drop(shard);

        if superseded.is_some() {
            counter!(m::CONNECTIONS_SUPERSEDED).increment(1);
        } else {
            gauge!(m::ACTIVE_CONNECTIONS).increment(1.0);
        }
        superseded.map(|e| e.handle)
    }

    /// Removes the entry, but only if it still belongs to `connection_id`.
    ///
    /// Idempotent, and safe to call from a superseded connection's cleanup
    /// without evicting the connection that replaced it.
    pub async fn deregister(&self, key: &ConnectionKey, connection_id: Uuid) -> bool {
        let mut shard = self.shard_for(&key.room).write().await;
        let matches = shard
            .get(key)
            .map(|e| e.handle.connection_id() == connection_id)
            .unwrap_or(false);
        if matches {
            shard.remove(key);
            gauge!(m::ACTIVE_CONNECTIONS).decrement(1.0);
        }
        matches
    }

    /// Updates `last_activity` to now. Called on every inbound frame,
    /// including pong.
    pub async fn touch(&self, key: &ConnectionKey) -> bool {
        let mut shard = self.shard_for(&key.room).write().await;
        match shard.get_mut(key) {
            Some(entry) => {
                entry.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// The connection's last activity time, if it is registered.
    pub async fn last_activity(&self, key: &ConnectionKey) -> Option<Instant> {
        let shard = self.shard_for(&key.room).read().await;
        shard.get(key).map(|e| e.last_activity)
    }

    /// Point-in-time room membership.
    pub async fn snapshot(&self, room: &RoomKey) -> Vec<UserId> {
        let shard = self.shard_for(room).read().await;
        shard
            .keys()
            .filter(|k| &k.room == room)
            .map(|k| k.user_id)
            .collect()
    }

    /// The live handle for a key, if any.
    pub async fn handle_for(&self, key: &ConnectionKey) -> Option<ConnectionHandle> {
        let shard = self.shard_for(&key.room).read().await;
        shard.get(key).map(|e| e.handle.clone())
    }

    /// Delivers a serialized envelope to every room member except
    /// `exclude`, dropping it per-connection when a queue is full.
    pub async fn fan_out(
        &self,
        room: &RoomKey,
        json: &str,
        exclude: Option<UserId>,
    ) -> FanOutReport {
        let handles: Vec<(UserId, ConnectionHandle)> = {
            let shard = self.shard_for(room).read().await;
            shard
                .iter()
                .filter(|(k, _)| &k.room == room && Some(k.user_id) != exclude)
                .map(|(k, e)| (k.user_id, e.handle.clone()))
                .collect()
        };

        let mut report = FanOutReport::default();
        for (user_id, handle) in handles {
            match handle.send(OutboundFrame::Text(json.to_string())) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::QueueFull) => {
                    report.dropped += 1;
                    counter!(m::BACKPRESSURE_DROPS).increment(1);
                    tracing::warn!(
                        room = %room,
                        user_id = %user_id,
                        "outbound queue full, dropping event for degraded connection"
                    );
                }
                Err(DeliveryError::Closed) => {
                    // Writer already gone; deregistration is in flight.
                    report.dropped += 1;
                }
            }
        }
        report
    }

    /// Whether the user holds any live connection, in any room.
    ///
    /// Used by the presence offline grace check after a disconnect.
    pub async fn is_user_connected(&self, user_id: UserId) -> bool {
        for shard in &self.shards {
            let shard = shard.read().await;
            if shard.keys().any(|k| k.user_id == user_id) {
                return true;
            }
        }
        false
    }

    /// Connections whose `last_activity` is older than `older_than`.
    ///
    /// The dead-socket sweep closes these as a backstop for heartbeat
    /// supervisors that themselves died.
    pub async fn stale_connections(
        &self,
        older_than: Duration,
    ) -> Vec<(ConnectionKey, ConnectionHandle)> {
        let now = Instant::now();
        let mut stale = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().await;
            for (key, entry) in shard.iter() {
                if now.duration_since(entry.last_activity) > older_than {
                    stale.push((*key, entry.handle.clone()));
                }
            }
        }
        stale
    }

    /// Total live connections across all rooms.
    pub async fn active_count(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            count += shard.read().await.len();
        }
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
