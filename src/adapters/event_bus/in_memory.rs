//! In-process event bus built on a tokio broadcast channel.
//!
//! Connects multiple gateway "instances" inside one process, which is
//! exactly what the integration tests need to exercise cross-process
//! fan-out without a broker.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{RoomEvent, RoomKey};
use crate::ports::{BusError, RoomEventHandler, RoomEventPublisher, RoomEventSubscriber};

pub struct InMemoryEventBus {
    tx: broadcast::Sender<RoomEvent>,
    published: Mutex<Vec<RoomEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            published: Mutex::new(Vec::new()),
        }
    }

    /// Every event published so far, for test assertions.
    pub fn published_events(&self) -> Vec<RoomEvent> {
        self.published.lock().unwrap().clone()
    }

    /// A subscriber wired to this bus.
    pub fn subscriber(&self) -> InMemoryBusSubscriber {
        InMemoryBusSubscriber {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomEventPublisher for InMemoryEventBus {
    async fn publish(&self, _room: RoomKey, event: &RoomEvent) -> Result<(), BusError> {
        self.published.lock().unwrap().push(event.clone());
        // No receivers is fine: local delivery already happened.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

pub struct InMemoryBusSubscriber {
    rx: broadcast::Receiver<RoomEvent>,
}

#[async_trait]
impl RoomEventSubscriber for InMemoryBusSubscriber {
    async fn run(&self, handler: Arc<dyn RoomEventHandler>) {
        let mut rx = self.rx.resubscribe();
        loop {
            match rx.recv().await {
                Ok(event) => handler.on_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "in-memory bus subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelId, UserId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(AtomicUsize);

    #[async_trait]
    impl RoomEventHandler for CountingHandler {
        async fn on_event(&self, _event: RoomEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let bus = InMemoryEventBus::new();
        let subscriber = bus.subscriber();
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));

        let run_handler = Arc::clone(&handler);
        let task = tokio::spawn(async move {
            subscriber.run(run_handler as Arc<dyn RoomEventHandler>).await;
        });

        let room = RoomKey::chat(ChannelId::new(1));
        let event = RoomEvent::new("gw-1", room, UserId::new(1), json!({"type": "typing"}));
        bus.publish(room, &event).await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while handler.0.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("subscriber should see the event");

        task.abort();
        assert_eq!(bus.published_events().len(), 1);
    }
}
