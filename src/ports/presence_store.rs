//! PresenceStore port - TTL-bounded online/offline status per tenant.
//!
//! Presence is keyed `(companyId, userId)` and expires on its own: absence
//! of an entry means offline. Entries are refreshed on heartbeat activity,
//! so staleness is bounded by the TTL since the last refresh.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{CompanyId, UserId};

/// Presence store failures.
///
/// Presence is advisory; callers log these and carry on serving.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("presence store unavailable: {0}")]
    Unavailable(String),
}

/// Port for the key-value presence collaborator.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Marks the user online with the given TTL. Also used to refresh.
    async fn mark_online(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), PresenceError>;

    /// Removes the user's presence entry immediately.
    async fn mark_offline(&self, company_id: CompanyId, user_id: UserId)
        -> Result<(), PresenceError>;

    /// All users of the tenant with a live (unexpired) presence entry.
    async fn online_users(&self, company_id: CompanyId) -> Result<Vec<UserId>, PresenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_store_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn PresenceStore) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn PresenceStore>>();
    }
}
