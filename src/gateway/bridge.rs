//! Bridge from the event bus into the local registry.
//!
//! Applies room events published by other gateway processes to locally
//! held connections. Events originating from this instance are skipped:
//! local delivery already happened on the registry fast-path, and
//! applying the echo would deliver duplicates.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;

use crate::domain::RoomEvent;
use crate::gateway::registry::ConnectionRegistry;
use crate::observability::metrics as m;
use crate::ports::RoomEventHandler;

pub struct BusBridge {
    instance_id: String,
    registry: Arc<ConnectionRegistry>,
}

impl BusBridge {
    pub fn new(instance_id: impl Into<String>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            instance_id: instance_id.into(),
            registry,
        }
    }
}

#[async_trait]
impl RoomEventHandler for BusBridge {
    async fn on_event(&self, event: RoomEvent) {
        if event.origin == self.instance_id {
            return;
        }

        counter!(m::BUS_EVENTS_APPLIED, "room_type" => event.room.room_type.as_str()).increment(1);
        let json = event.payload.to_string();
        let report = self
            .registry
            .fan_out(&event.room, &json, Some(event.sender_id))
            .await;
        tracing::debug!(
            room = %event.room,
            origin = %event.origin,
            delivered = report.delivered,
            dropped = report.dropped,
            "applied bus event"
        );
    }
}
