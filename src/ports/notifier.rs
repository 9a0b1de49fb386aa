//! Notifier port - best-effort push/email fan-out.
//!
//! Invoked after a message has been persisted, never before, and never on
//! the serving path: failures are logged and must not block or close the
//! sender's connection.

use async_trait::async_trait;

use crate::ports::SavedMessage;

/// Port for the notification collaborator.
///
/// Best-effort by contract: implementations return nothing and swallow
/// their own failures (logging them), so callers can fire and forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifies offline channel members about a newly saved message.
    async fn message_saved(&self, message: &SavedMessage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn Notifier) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn Notifier>>();
    }
}
