//! Room keys identifying chat channels and live meetings.
//!
//! A room is not a persisted entity: it is only a grouping key into the
//! connection registry and the event bus. Live membership is derived from
//! the registry, never stored independently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{ChannelId, MeetingId};

/// The kind of room a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Chat,
    Meeting,
}

impl RoomType {
    /// Stable string form used in bus channel names and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Chat => "chat",
            RoomType::Meeting => "meeting",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(roomType, roomId)` aggregate identifying one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    pub room_type: RoomType,
    pub room_id: i64,
}

impl RoomKey {
    /// Room key for a chat channel.
    pub fn chat(channel_id: ChannelId) -> Self {
        Self {
            room_type: RoomType::Chat,
            room_id: channel_id.as_i64(),
        }
    }

    /// Room key for a live meeting.
    pub fn meeting(meeting_id: MeetingId) -> Self {
        Self {
            room_type: RoomType::Meeting,
            room_id: meeting_id.as_i64(),
        }
    }

    /// Pub/sub channel name for this room (`room:chat:7`).
    pub fn bus_channel(&self) -> String {
        format!("room:{}:{}", self.room_type, self.room_id)
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.room_type, self.room_id)
    }
}

/// Parse error for [`RoomKey`] string forms.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid room key: {0}")]
pub struct RoomKeyParseError(String);

impl FromStr for RoomKey {
    type Err = RoomKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| RoomKeyParseError(s.to_string()))?;
        let room_type = match kind {
            "chat" => RoomType::Chat,
            "meeting" => RoomType::Meeting,
            _ => return Err(RoomKeyParseError(s.to_string())),
        };
        let room_id = id.parse().map_err(|_| RoomKeyParseError(s.to_string()))?;
        Ok(Self { room_type, room_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_room_key_displays_as_type_colon_id() {
        let key = RoomKey::chat(ChannelId::new(7));
        assert_eq!(key.to_string(), "chat:7");
        assert_eq!(key.bus_channel(), "room:chat:7");
    }

    #[test]
    fn meeting_room_key_round_trips() {
        let key = RoomKey::meeting(MeetingId::new(12));
        let parsed: RoomKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn unknown_room_type_fails_to_parse() {
        assert!("payroll:3".parse::<RoomKey>().is_err());
        assert!("chat".parse::<RoomKey>().is_err());
        assert!("chat:x".parse::<RoomKey>().is_err());
    }
}
