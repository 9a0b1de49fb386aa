//! ChatStore port - persistence collaborator for chat content.
//!
//! The gateway never broadcasts a chat message before this collaborator
//! has accepted it: a message that fails to save is never shown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ChannelId, MessageId, ReactionPayload, UserId};

/// The persisted form of a chat message, as returned by the store.
///
/// This is what gets broadcast to the room, so clients always see the
/// canonical id and timestamp assigned by persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    pub body: Value,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist (message for a reaction, etc.).
    #[error("not found: {0}")]
    NotFound(String),

    /// The store rejected or could not complete the write.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Port for the chat persistence collaborator.
///
/// Reaction operations must be idempotent: adds and removes may arrive
/// reordered across concurrent senders and replays must not fail.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persists a chat message and returns its canonical saved form.
    async fn save_message(
        &self,
        channel_id: ChannelId,
        sender_id: UserId,
        body: Value,
    ) -> Result<SavedMessage, StoreError>;

    /// Marks the channel read for `user_id` up to now.
    async fn mark_read(&self, channel_id: ChannelId, user_id: UserId) -> Result<(), StoreError>;

    /// Records an emoji reaction. Duplicate adds are a no-op.
    async fn add_reaction(
        &self,
        user_id: UserId,
        reaction: &ReactionPayload,
    ) -> Result<(), StoreError>;

    /// Removes an emoji reaction. Removing an absent reaction is a no-op.
    async fn remove_reaction(
        &self,
        user_id: UserId,
        reaction: &ReactionPayload,
    ) -> Result<(), StoreError>;
}
