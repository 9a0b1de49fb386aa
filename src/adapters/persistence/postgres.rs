//! Postgres persistence adapter for chat content and meeting membership.
//!
//! Thin by intent: the gateway owns delivery, not the data model, so
//! every method is a single statement against tables owned by the
//! platform's persistence service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::domain::{ChannelId, MeetingId, MessageId, ReactionPayload, UserId};
use crate::ports::{
    ChatStore, MeetingStore, ParticipantChange, SavedMessage, StoreError,
};

pub struct PostgresWorkforceStore {
    pool: PgPool,
}

impl PostgresWorkforceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl ChatStore for PostgresWorkforceStore {
    async fn save_message(
        &self,
        channel_id: ChannelId,
        sender_id: UserId,
        body: Value,
    ) -> Result<SavedMessage, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO chat_messages (channel_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, created_at
            "#,
        )
        .bind(channel_id.as_i64())
        .bind(sender_id.as_i64())
        .bind(&body)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        let id: i64 = row.get("id");
        let created_at: DateTime<Utc> = row.get("created_at");
        Ok(SavedMessage {
            id: MessageId::new(id),
            channel_id,
            sender_id,
            body,
            created_at,
        })
    }

    async fn mark_read(&self, channel_id: ChannelId, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO channel_reads (channel_id, user_id, last_read_at)
            VALUES ($1, $2, now())
            ON CONFLICT (channel_id, user_id)
            DO UPDATE SET last_read_at = now()
            "#,
        )
        .bind(channel_id.as_i64())
        .bind(user_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        user_id: UserId,
        reaction: &ReactionPayload,
    ) -> Result<(), StoreError> {
        // Primary key (message_id, user_id, emoji) makes replays a no-op.
        sqlx::query(
            r#"
            INSERT INTO message_reactions (message_id, user_id, emoji)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(reaction.message_id)
        .bind(user_id.as_i64())
        .bind(&reaction.emoji)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn remove_reaction(
        &self,
        user_id: UserId,
        reaction: &ReactionPayload,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM message_reactions
            WHERE message_id = $1 AND user_id = $2 AND emoji = $3
            "#,
        )
        .bind(reaction.message_id)
        .bind(user_id.as_i64())
        .bind(&reaction.emoji)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for PostgresWorkforceStore {
    async fn update_participant(
        &self,
        meeting_id: MeetingId,
        user_id: UserId,
        change: ParticipantChange,
    ) -> Result<(), StoreError> {
        let query = match change {
            ParticipantChange::Joined => {
                r#"
                INSERT INTO meeting_participants (meeting_id, user_id, joined_at, left_at)
                VALUES ($1, $2, now(), NULL)
                ON CONFLICT (meeting_id, user_id)
                DO UPDATE SET joined_at = now(), left_at = NULL
                "#
            }
            ParticipantChange::Left => {
                r#"
                UPDATE meeting_participants
                SET left_at = now()
                WHERE meeting_id = $1 AND user_id = $2
                "#
            }
        };

        sqlx::query(query)
            .bind(meeting_id.as_i64())
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
