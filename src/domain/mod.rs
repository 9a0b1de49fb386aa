//! Domain types for the messaging gateway.
//!
//! Pure value objects with no infrastructure dependencies:
//!
//! - [`ids`] - Strongly-typed identifiers
//! - [`room`] - Room keys (`chat:{id}` / `meeting:{id}`)
//! - [`envelope`] - Wire message protocol (tagged JSON frames)

pub mod envelope;
pub mod ids;
pub mod room;

pub use envelope::{
    ChatFrame, ErrorFrame, MeetingFrame, ReactionAction, ReactionPayload, RoomEvent, ServerFrame,
};
pub use ids::{ChannelId, CompanyId, MeetingId, MessageId, UserId};
pub use room::{RoomKey, RoomType};
