//! MeetingStore port - persistence collaborator for meeting participation.

use async_trait::async_trait;

use crate::domain::{MeetingId, UserId};

pub use super::chat_store::StoreError;

/// A participant joining or leaving a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantChange {
    Joined,
    Left,
}

impl ParticipantChange {
    /// Event name broadcast to the room after the change is persisted.
    pub fn event_type(&self) -> &'static str {
        match self {
            ParticipantChange::Joined => "participant_joined",
            ParticipantChange::Left => "participant_left",
        }
    }
}

/// Port recording meeting join/leave times in the persistence collaborator.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Stamps the participant row with the join or leave time.
    async fn update_participant(
        &self,
        meeting_id: MeetingId,
        user_id: UserId,
        change: ParticipantChange,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_change_maps_to_event_type() {
        assert_eq!(ParticipantChange::Joined.event_type(), "participant_joined");
        assert_eq!(ParticipantChange::Left.event_type(), "participant_left");
    }

    #[test]
    fn meeting_store_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn MeetingStore) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn MeetingStore>>();
    }
}
