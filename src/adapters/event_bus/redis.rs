//! Redis pub/sub event bus.
//!
//! Each room maps to one channel (`room:chat:{id}` / `room:meeting:{id}`)
//! and the subscriber pattern-subscribes to `room:*`, so every gateway
//! process sees every room event. The subscriber reconnects with
//! exponential backoff plus jitter; once the attempt budget is spent it
//! marks the bus unhealthy and stops, leaving local delivery as the only
//! path until the process is restarted or the next health check pages
//! someone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use redis::aio::MultiplexedConnection;

use crate::domain::{RoomEvent, RoomKey};
use crate::observability::metrics as m;
use crate::ports::{BusError, RoomEventHandler, RoomEventPublisher, RoomEventSubscriber};

const SUBSCRIBE_PATTERN: &str = "room:*";

pub struct RedisEventBus {
    conn: MultiplexedConnection,
    healthy: Arc<AtomicBool>,
}

impl RedisEventBus {
    pub fn new(conn: MultiplexedConnection, healthy: Arc<AtomicBool>) -> Self {
        Self { conn, healthy }
    }
}

#[async_trait]
impl RoomEventPublisher for RedisEventBus {
    async fn publish(&self, room: RoomKey, event: &RoomEvent) -> Result<(), BusError> {
        let payload =
            serde_json::to_string(event).map_err(|e| BusError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(room.bus_channel())
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| BusError::Unavailable(e.to_string()))
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

pub struct RedisEventSubscriber {
    client: redis::Client,
    healthy: Arc<AtomicBool>,
    max_reconnect_attempts: u32,
    base_backoff: Duration,
}

impl RedisEventSubscriber {
    pub fn new(
        client: redis::Client,
        healthy: Arc<AtomicBool>,
        max_reconnect_attempts: u32,
        base_backoff: Duration,
    ) -> Self {
        Self {
            client,
            healthy,
            max_reconnect_attempts,
            base_backoff,
        }
    }

    /// Runs one subscription until the connection drops.
    async fn subscribe_once(&self, handler: &Arc<dyn RoomEventHandler>) -> redis::RedisResult<()> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub.psubscribe(SUBSCRIBE_PATTERN).await?;

        self.healthy.store(true, Ordering::Relaxed);
        tracing::info!(pattern = SUBSCRIBE_PATTERN, "event bus subscriber connected");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable bus payload, skipping");
                    continue;
                }
            };
            match serde_json::from_str::<RoomEvent>(&payload) {
                Ok(event) => handler.on_event(event).await,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed room event on bus, skipping");
                }
            }
        }
        Ok(())
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff.saturating_mul(1 << attempt.min(6));
        let jitter = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64 / 2);
        exp + Duration::from_millis(jitter)
    }
}

#[async_trait]
impl RoomEventSubscriber for RedisEventSubscriber {
    async fn run(&self, handler: Arc<dyn RoomEventHandler>) {
        let mut attempts: u32 = 0;
        loop {
            match self.subscribe_once(&handler).await {
                Ok(()) => {
                    tracing::warn!("event bus subscription ended, reconnecting");
                    attempts = 0;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempts, "event bus subscription failed");
                }
            }

            attempts += 1;
            if attempts > self.max_reconnect_attempts {
                self.healthy.store(false, Ordering::Relaxed);
                tracing::error!(
                    attempts,
                    "event bus reconnect budget exhausted, serving local connections only"
                );
                return;
            }

            metrics::counter!(m::BUS_RECONNECTS).increment(1);
            let delay = self.backoff_for(attempts);
            tracing::info!(attempt = attempts, delay_ms = delay.as_millis() as u64, "bus reconnect backoff");
            tokio::time::sleep(delay).await;
        }
    }
}
