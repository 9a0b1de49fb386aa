//! Room authorizer double with explicit allow lists.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{ChannelId, MeetingId, UserId};
use crate::ports::{AuthzError, RoomAuthorizer};

#[derive(Default)]
struct AllowLists {
    channels: HashSet<(ChannelId, UserId)>,
    meetings: HashSet<(MeetingId, UserId)>,
    allow_all: bool,
}

/// Denies everything unless told otherwise. `allow_all` exists for local
/// development only.
#[derive(Default)]
pub struct StaticRoomAuthorizer {
    lists: Mutex<AllowLists>,
}

impl StaticRoomAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_all() -> Self {
        let authorizer = Self::default();
        authorizer.lists.lock().unwrap().allow_all = true;
        authorizer
    }

    pub fn allow_channel(&self, channel_id: ChannelId, user_id: UserId) {
        self.lists.lock().unwrap().channels.insert((channel_id, user_id));
    }

    pub fn allow_meeting(&self, meeting_id: MeetingId, user_id: UserId) {
        self.lists.lock().unwrap().meetings.insert((meeting_id, user_id));
    }
}

#[async_trait]
impl RoomAuthorizer for StaticRoomAuthorizer {
    async fn is_channel_member(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<bool, AuthzError> {
        let lists = self.lists.lock().unwrap();
        Ok(lists.allow_all || lists.channels.contains(&(channel_id, user_id)))
    }

    async fn is_meeting_participant(
        &self,
        user_id: UserId,
        meeting_id: MeetingId,
    ) -> Result<bool, AuthzError> {
        let lists = self.lists.lock().unwrap();
        Ok(lists.allow_all || lists.meetings.contains(&(meeting_id, user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn denies_by_default_and_allows_listed_members() {
        let authorizer = StaticRoomAuthorizer::new();
        authorizer.allow_channel(ChannelId::new(7), UserId::new(1));

        assert!(authorizer
            .is_channel_member(UserId::new(1), ChannelId::new(7))
            .await
            .unwrap());
        assert!(!authorizer
            .is_channel_member(UserId::new(2), ChannelId::new(7))
            .await
            .unwrap());
        assert!(!authorizer
            .is_meeting_participant(UserId::new(1), MeetingId::new(7))
            .await
            .unwrap());
    }
}
