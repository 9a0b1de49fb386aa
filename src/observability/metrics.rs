//! Metric names and the Prometheus recorder.
//!
//! Every metric the gateway emits is named here so the set of series is
//! visible in one place. Counters are monotonic; the single gauge tracks
//! live registrations.

use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Gauge: connections currently held by the local registry.
pub const ACTIVE_CONNECTIONS: &str = "crewdeck_active_connections";

/// Counter: accepted WebSocket connections, labelled by `room_type`.
pub const CONNECTIONS_OPENED: &str = "crewdeck_connections_opened_total";

/// Counter: connections replaced by a newer one for the same room slot.
pub const CONNECTIONS_SUPERSEDED: &str = "crewdeck_connections_superseded_total";

/// Counter: admissions refused by the sliding-window rate limiter.
pub const RATE_LIMIT_REJECTIONS: &str = "crewdeck_rate_limit_rejections_total";

/// Counter: frames dropped because a recipient's outbound queue was full.
pub const BACKPRESSURE_DROPS: &str = "crewdeck_backpressure_drops_total";

/// Counter: connections closed for missing their pong deadline.
pub const HEARTBEAT_TIMEOUTS: &str = "crewdeck_heartbeat_timeouts_total";

/// Counter: inbound frames, labelled by `room_type` and `type`.
pub const MESSAGES: &str = "crewdeck_messages_total";

/// Counter: events the bridge applied from the bus, labelled by `room_type`.
pub const BUS_EVENTS_APPLIED: &str = "crewdeck_bus_events_applied_total";

/// Counter: failed publishes to the event bus.
pub const BUS_PUBLISH_FAILURES: &str = "crewdeck_bus_publish_failures_total";

/// Counter: subscriber reconnect attempts to the event bus.
pub const BUS_RECONNECTS: &str = "crewdeck_bus_reconnects_total";

/// Installs the global Prometheus recorder and returns the handle used
/// by the `/metrics` route to render the exposition text.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_gauge!(
        ACTIVE_CONNECTIONS,
        Unit::Count,
        "WebSocket connections currently registered on this instance"
    );
    describe_counter!(CONNECTIONS_OPENED, "Accepted WebSocket connections");
    describe_counter!(
        CONNECTIONS_SUPERSEDED,
        "Connections replaced by a newer connection for the same user and room"
    );
    describe_counter!(
        RATE_LIMIT_REJECTIONS,
        "Connection attempts refused by the per-user rate limiter"
    );
    describe_counter!(
        BACKPRESSURE_DROPS,
        "Outbound frames dropped because a connection's queue was full"
    );
    describe_counter!(
        HEARTBEAT_TIMEOUTS,
        "Connections closed after failing to answer a heartbeat ping"
    );
    describe_counter!(MESSAGES, "Inbound frames by room type and frame type");
    describe_counter!(BUS_EVENTS_APPLIED, "Room events applied from the event bus");
    describe_counter!(BUS_PUBLISH_FAILURES, "Failed publishes to the event bus");
    describe_counter!(BUS_RECONNECTS, "Event bus subscriber reconnect attempts");
}
