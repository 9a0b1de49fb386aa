//! RoomAuthorizer port - room membership checks.
//!
//! Authorization data (channel membership, meeting rosters) lives in the
//! platform's relational store. The gateway asks a single yes/no question
//! per connection attempt and caches nothing.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ChannelId, MeetingId, UserId};

/// Authorization lookup failures.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The backing store could not answer.
    #[error("authorization check unavailable: {0}")]
    Unavailable(String),
}

/// Port answering "may this user enter this room".
///
/// A `false` answer is not an error: the gateway closes the attempt with
/// the unauthorized-room code. Errors mean the check itself failed and
/// map to the internal-error close code.
#[async_trait]
pub trait RoomAuthorizer: Send + Sync {
    /// Whether `user_id` is a member of the chat channel.
    async fn is_channel_member(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<bool, AuthzError>;

    /// Whether `user_id` is a participant of the meeting.
    async fn is_meeting_participant(
        &self,
        user_id: UserId,
        meeting_id: MeetingId,
    ) -> Result<bool, AuthzError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_authorizer_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn RoomAuthorizer) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn RoomAuthorizer>>();
    }
}
