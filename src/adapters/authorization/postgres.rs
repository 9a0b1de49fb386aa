//! Room membership checks against the platform database.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{ChannelId, MeetingId, UserId};
use crate::ports::{AuthzError, RoomAuthorizer};

pub struct PostgresRoomAuthorizer {
    pool: PgPool,
}

impl PostgresRoomAuthorizer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> AuthzError {
    AuthzError::Unavailable(e.to_string())
}

#[async_trait]
impl RoomAuthorizer for PostgresRoomAuthorizer {
    async fn is_channel_member(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<bool, AuthzError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM channel_members
                WHERE channel_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(channel_id.as_i64())
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)
    }

    async fn is_meeting_participant(
        &self,
        user_id: UserId,
        meeting_id: MeetingId,
    ) -> Result<bool, AuthzError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM meeting_participants
                WHERE meeting_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(meeting_id.as_i64())
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)
    }
}
