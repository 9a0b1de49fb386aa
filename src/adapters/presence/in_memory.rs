//! In-memory presence store with real TTL expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::{CompanyId, UserId};
use crate::ports::{PresenceError, PresenceStore};

/// Process-local presence store for tests and single-instance setups.
///
/// Uses `tokio::time::Instant` for expiry so paused-clock tests can
/// drive TTLs deterministically.
#[derive(Default)]
pub struct InMemoryPresenceStore {
    entries: Mutex<HashMap<(CompanyId, UserId), Instant>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn mark_online(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), PresenceError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((company_id, user_id), Instant::now() + ttl);
        Ok(())
    }

    async fn mark_offline(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<(), PresenceError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(company_id, user_id));
        Ok(())
    }

    async fn online_users(&self, company_id: CompanyId) -> Result<Vec<UserId>, PresenceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, expires_at| *expires_at > now);

        let mut online: Vec<UserId> = entries
            .keys()
            .filter(|(company, _)| *company == company_id)
            .map(|(_, user)| *user)
            .collect();
        online.sort_unstable_by_key(|u| u.as_i64());
        Ok(online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let store = InMemoryPresenceStore::new();
        let company = CompanyId::new(1);
        store
            .mark_online(company, UserId::new(1), Duration::from_secs(90))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.online_users(company).await.unwrap(), vec![UserId::new(1)]);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.online_users(company).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_the_ttl() {
        let store = InMemoryPresenceStore::new();
        let company = CompanyId::new(1);
        let ttl = Duration::from_secs(90);
        store.mark_online(company, UserId::new(1), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        store.mark_online(company, UserId::new(1), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.online_users(company).await.unwrap(), vec![UserId::new(1)]);
    }

    #[tokio::test]
    async fn tenants_do_not_see_each_other() {
        let store = InMemoryPresenceStore::new();
        let ttl = Duration::from_secs(90);
        store.mark_online(CompanyId::new(1), UserId::new(1), ttl).await.unwrap();
        store.mark_online(CompanyId::new(2), UserId::new(2), ttl).await.unwrap();

        assert_eq!(
            store.online_users(CompanyId::new(1)).await.unwrap(),
            vec![UserId::new(1)]
        );
        assert_eq!(
            store.online_users(CompanyId::new(2)).await.unwrap(),
            vec![UserId::new(2)]
        );
    }

    #[tokio::test]
    async fn mark_offline_removes_immediately() {
        let store = InMemoryPresenceStore::new();
        let company = CompanyId::new(1);
        store
            .mark_online(company, UserId::new(1), Duration::from_secs(90))
            .await
            .unwrap();
        store.mark_offline(company, UserId::new(1)).await.unwrap();
        assert!(store.online_users(company).await.unwrap().is_empty());
    }
}
