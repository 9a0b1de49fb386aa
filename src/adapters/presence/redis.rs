//! Redis-backed presence store.
//!
//! One key per online user, `presence:{company_id}:{user_id}`, with a
//! TTL set on every refresh. Expiry is Redis's own, so a gateway crash
//! leaves at most one TTL window of stale presence behind.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::domain::{CompanyId, UserId};
use crate::ports::{PresenceError, PresenceStore};

pub struct RedisPresenceStore {
    conn: MultiplexedConnection,
}

impl RedisPresenceStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn key(company_id: CompanyId, user_id: UserId) -> String {
        format!("presence:{company_id}:{user_id}")
    }

    fn scan_pattern(company_id: CompanyId) -> String {
        format!("presence:{company_id}:*")
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn mark_online(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), PresenceError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(Self::key(company_id, user_id))
            .arg(1)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| PresenceError::Unavailable(e.to_string()))
    }

    async fn mark_offline(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<(), PresenceError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::key(company_id, user_id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| PresenceError::Unavailable(e.to_string()))
    }

    async fn online_users(&self, company_id: CompanyId) -> Result<Vec<UserId>, PresenceError> {
        let mut conn = self.conn.clone();
        let pattern = Self::scan_pattern(company_id);
        let mut online = Vec::new();
        let mut cursor: u64 = 0;

        // Cursor-based SCAN; KEYS would block the server on big keyspaces.
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| PresenceError::Unavailable(e.to_string()))?;

            for key in keys {
                if let Some(id) = key.rsplit(':').next().and_then(|s| s.parse::<i64>().ok()) {
                    online.push(UserId::new(id));
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        online.sort_unstable_by_key(|u| u.as_i64());
        online.dedup();
        Ok(online)
    }
}
