//! Wire message protocol for gateway connections.
//!
//! Every frame is one JSON object discriminated by `type`. Inbound frames
//! are tagged enums per room kind so dispatch is an exhaustive match; a
//! `type` the enum does not know is a deserialization error, which the
//! serving loop treats as a protocol warning, never a fatal error.
//!
//! Room broadcasts travel as raw [`serde_json::Value`] payloads inside
//! [`RoomEvent`]: WebRTC signaling in particular is relayed verbatim, so
//! the gateway never imposes a schema on payloads it only forwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ChannelId, UserId};
use super::room::RoomKey;

// ============================================
// Client → Server Frames
// ============================================

/// Frames accepted on a chat channel connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    /// Liveness probe from the client.
    Ping,

    /// Liveness reply to a server ping. Never broadcast.
    Pong,

    /// Ephemeral typing indicator, rebroadcast to the room minus sender.
    Typing { is_typing: bool },

    /// Marks the channel read for the sender, then rebroadcast.
    ReadReceipt,

    /// Emoji reaction add/remove on a persisted message.
    Reaction { reaction: ReactionPayload },

    /// New chat message. Persisted first, broadcast only on success.
    Message {
        message: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
    },
}

/// Frames accepted on a meeting connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeetingFrame {
    /// Liveness probe from the client.
    Ping,

    /// Liveness reply to a server ping. Never broadcast.
    Pong,

    /// WebRTC offer, relayed verbatim to the room minus sender.
    Offer { data: Value },

    /// WebRTC answer, relayed verbatim to the room minus sender.
    Answer { data: Value },

    /// ICE candidate, relayed verbatim to the room minus sender.
    #[serde(rename = "ice-candidate")]
    IceCandidate { data: Value },

    /// Presence query; the reply goes to the sender only.
    Presence,

    /// Participant joined; persisted, then membership change broadcast.
    JoinMeeting,

    /// Participant left; persisted, then membership change broadcast.
    LeaveMeeting,
}

/// Payload of a `reaction` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionPayload {
    pub action: ReactionAction,
    pub message_id: i64,
    pub emoji: String,
}

/// Whether a reaction is being added or removed.
///
/// Handlers must tolerate add/remove arriving reordered across senders,
/// so both operations are idempotent at the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    Add,
    Remove,
}

// ============================================
// Server → Client Frames
// ============================================

/// Frames the gateway itself originates toward one client.
///
/// Room broadcasts are raw JSON payloads and do not pass through this
/// type; see [`RoomEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after successful registration.
    Connected {
        connection_id: String,
        room: String,
        timestamp: String,
    },

    /// Application-level liveness probe from the heartbeat supervisor.
    Ping,

    /// Reply to a client ping.
    Pong,

    /// Online user ids for the sender's tenant (reply to `presence`).
    Presence { online: Vec<UserId> },

    /// Handler failure scoped to the sender; the connection stays open.
    Error(ErrorFrame),
}

/// Error detail sent to the offending sender only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
}

impl ServerFrame {
    /// Serializes the frame to its wire representation.
    pub fn to_json(&self) -> String {
        // A tagged unit/struct enum over owned data cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }
}

// ============================================
// Cross-Process Events
// ============================================

/// One room event as carried on the pub/sub bus.
///
/// `origin` is the publishing gateway instance; a process skips events it
/// published itself, since the local fast-path already delivered them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub origin: String,
    pub room: RoomKey,
    pub sender_id: UserId,
    pub payload: Value,
}

impl RoomEvent {
    pub fn new(origin: impl Into<String>, room: RoomKey, sender_id: UserId, payload: Value) -> Self {
        Self {
            origin: origin.into(),
            room,
            sender_id,
            payload,
        }
    }
}
