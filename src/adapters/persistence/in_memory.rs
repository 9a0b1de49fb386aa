//! In-memory chat and meeting store with failure injection.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::domain::{ChannelId, MeetingId, MessageId, ReactionPayload, UserId};
use crate::ports::{
    ChatStore, MeetingStore, ParticipantChange, SavedMessage, StoreError,
};

#[derive(Default)]
struct State {
    next_message_id: i64,
    messages: Vec<SavedMessage>,
    reads: Vec<(ChannelId, UserId)>,
    reactions: HashSet<(i64, UserId, String)>,
    participants: Vec<(MeetingId, UserId, ParticipantChange)>,
    fail_next: bool,
}

impl State {
    fn check_fault(&mut self) -> Result<(), StoreError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

/// Test double for both persistence ports. `fail_next_write` makes the
/// next write fail once, for exercising the fail-closed path.
#[derive(Default)]
pub struct InMemoryWorkforceStore {
    state: Mutex<State>,
}

impl InMemoryWorkforceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_write(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    pub fn saved_messages(&self) -> Vec<SavedMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn read_marks(&self) -> Vec<(ChannelId, UserId)> {
        self.state.lock().unwrap().reads.clone()
    }

    pub fn reaction_count(&self, message_id: i64, emoji: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .reactions
            .iter()
            .filter(|(id, _, e)| *id == message_id && e == emoji)
            .count()
    }

    pub fn participant_changes(&self) -> Vec<(MeetingId, UserId, ParticipantChange)> {
        self.state.lock().unwrap().participants.clone()
    }
}

#[async_trait]
impl ChatStore for InMemoryWorkforceStore {
    async fn save_message(
        &self,
        channel_id: ChannelId,
        sender_id: UserId,
        body: Value,
    ) -> Result<SavedMessage, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_fault()?;
        state.next_message_id += 1;
        let saved = SavedMessage {
            id: MessageId::new(state.next_message_id),
            channel_id,
            sender_id,
            body,
            created_at: Utc::now(),
        };
        state.messages.push(saved.clone());
        Ok(saved)
    }

    async fn mark_read(&self, channel_id: ChannelId, user_id: UserId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_fault()?;
        state.reads.push((channel_id, user_id));
        Ok(())
    }

    async fn add_reaction(
        &self,
        user_id: UserId,
        reaction: &ReactionPayload,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_fault()?;
        state
            .reactions
            .insert((reaction.message_id, user_id, reaction.emoji.clone()));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        user_id: UserId,
        reaction: &ReactionPayload,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_fault()?;
        state
            .reactions
            .remove(&(reaction.message_id, user_id, reaction.emoji.clone()));
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for InMemoryWorkforceStore {
    async fn update_participant(
        &self,
        meeting_id: MeetingId,
        user_id: UserId,
        change: ParticipantChange,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_fault()?;
        state.participants.push((meeting_id, user_id, change));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReactionAction;
    use serde_json::json;

    #[tokio::test]
    async fn messages_get_monotonic_ids() {
        let store = InMemoryWorkforceStore::new();
        let a = store
            .save_message(ChannelId::new(1), UserId::new(1), json!({"text": "a"}))
            .await
            .unwrap();
        let b = store
            .save_message(ChannelId::new(1), UserId::new(1), json!({"text": "b"}))
            .await
            .unwrap();
        assert!(b.id.as_i64() > a.id.as_i64());
    }

    #[tokio::test]
    async fn reaction_add_is_idempotent() {
        let store = InMemoryWorkforceStore::new();
        let reaction = ReactionPayload {
            action: ReactionAction::Add,
            message_id: 1,
            emoji: "👍".to_string(),
        };
        store.add_reaction(UserId::new(1), &reaction).await.unwrap();
        store.add_reaction(UserId::new(1), &reaction).await.unwrap();
        assert_eq!(store.reaction_count(1, "👍"), 1);
    }

    #[tokio::test]
    async fn removing_an_absent_reaction_is_a_no_op() {
        let store = InMemoryWorkforceStore::new();
        let reaction = ReactionPayload {
            action: ReactionAction::Remove,
            message_id: 1,
            emoji: "👍".to_string(),
        };
        store.remove_reaction(UserId::new(1), &reaction).await.unwrap();
        assert_eq!(store.reaction_count(1, "👍"), 0);
    }

    #[tokio::test]
    async fn injected_failure_hits_exactly_one_write() {
        let store = InMemoryWorkforceStore::new();
        store.fail_next_write();
        assert!(store
            .save_message(ChannelId::new(1), UserId::new(1), json!({}))
            .await
            .is_err());
        assert!(store
            .save_message(ChannelId::new(1), UserId::new(1), json!({}))
            .await
            .is_ok());
    }
}
