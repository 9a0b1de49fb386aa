//! Event bus ports - cross-process room fan-out.
//!
//! Publishing a room event puts it in front of every *other* gateway
//! process subscribed to rooms; the publishing process has already
//! delivered locally via the registry fast-path. Losing the bus degrades
//! delivery to co-located connections only, it never stops serving.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RoomEvent, RoomKey};

/// Bus failures. Publish failures are logged and non-fatal by contract.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    #[error("event serialization failed: {0}")]
    Serialization(String),
}

/// Handler invoked for every room event received from the bus.
///
/// Implementations must be quick and must not fail the subscriber loop;
/// they own their own error logging.
#[async_trait]
pub trait RoomEventHandler: Send + Sync {
    async fn on_event(&self, event: RoomEvent);
}

/// Port for publishing room events to all subscribed processes.
#[async_trait]
pub trait RoomEventPublisher: Send + Sync {
    /// Publishes one event to the room's bus channel.
    async fn publish(&self, room: RoomKey, event: &RoomEvent) -> Result<(), BusError>;

    /// Whether the bus connection is currently believed healthy.
    ///
    /// Turns false after the subscriber exhausts its reconnect budget;
    /// surfaced through the health endpoint.
    fn is_healthy(&self) -> bool;
}

/// Port for subscribing to all room channels.
#[async_trait]
pub trait RoomEventSubscriber: Send + Sync {
    /// Starts the subscription loop, invoking `handler` per event.
    ///
    /// Runs until cancelled or until the reconnect budget is exhausted.
    async fn run(&self, handler: std::sync::Arc<dyn RoomEventHandler>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_traits_are_object_safe_and_send_sync() {
        fn _assert_publisher(_: &dyn RoomEventPublisher) {}
        fn _assert_subscriber(_: &dyn RoomEventSubscriber) {}
        fn _assert_handler(_: &dyn RoomEventHandler) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn RoomEventPublisher>>();
    }
}
