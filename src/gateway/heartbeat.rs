//! Per-connection liveness supervision.
//!
//! Every registered connection owns one supervisor task driving the state
//! machine `OPEN → AWAITING_PONG → OPEN` (pong observed via the registry's
//! `last_activity`) or `OPEN → AWAITING_PONG → TIMED_OUT → CLOSED` (no
//! pong within the timeout; socket closed with the heartbeat-timeout
//! code and the entry deregistered).
//!
//! A second, independent layer, the dead-socket sweep, closes any
//! connection idle longer than `2 × heartbeat_timeout`. The sweep is a
//! backstop for supervisors that themselves died, so a stalled task
//! cannot leak registry entries indefinitely.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::CompanyId;
use crate::gateway::close_codes;
use crate::gateway::registry::{ConnectionHandle, ConnectionKey, ConnectionRegistry, OutboundFrame};
use crate::observability::metrics as m;
use crate::ports::PresenceStore;

/// Liveness state of one supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    /// Healthy; a ping will be sent on the next tick.
    Open,
    /// Ping sent, waiting for activity newer than `ping_sent`.
    AwaitingPong { ping_sent: Instant },
    /// No pong within the timeout; the connection must be closed.
    TimedOut,
    /// Supervision is over (deregistered or writer gone).
    Closed,
}

impl HeartbeatState {
    /// Resolves an `AwaitingPong` state against the connection's last
    /// observed activity. Other states pass through unchanged.
    pub fn check_pong(self, last_activity: Instant, now: Instant, timeout: Duration) -> Self {
        match self {
            HeartbeatState::AwaitingPong { ping_sent } => {
                if last_activity >= ping_sent {
                    HeartbeatState::Open
                } else if now.duration_since(ping_sent) >= timeout {
                    HeartbeatState::TimedOut
                } else {
                    self
                }
            }
            other => other,
        }
    }
}

/// Supervisor for a single connection's liveness.
///
/// Spawned at registration and aborted together with the connection's
/// writer and receive tasks on disconnect.
pub struct HeartbeatSupervisor {
    registry: Arc<ConnectionRegistry>,
    presence: Arc<dyn PresenceStore>,
    key: ConnectionKey,
    company_id: CompanyId,
    handle: ConnectionHandle,
    interval: Duration,
    timeout: Duration,
    presence_ttl: Duration,
}

impl HeartbeatSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        presence: Arc<dyn PresenceStore>,
        key: ConnectionKey,
        company_id: CompanyId,
        handle: ConnectionHandle,
        interval: Duration,
        timeout: Duration,
        presence_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            presence,
            key,
            company_id,
            handle,
            interval,
            timeout,
            presence_ttl,
        }
    }

    /// Runs until the connection closes, times out, or is deregistered.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        ticker.tick().await;

        let mut state = HeartbeatState::Open;
        loop {
            // While awaiting a pong the timeout deadline may land between
            // ticks, so wake on whichever comes first.
            match state {
                HeartbeatState::AwaitingPong { ping_sent } => {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = tokio::time::sleep_until(ping_sent + self.timeout) => {}
                    }
                }
                _ => {
                    ticker.tick().await;
                }
            }

            if self.handle.is_closed() {
                break;
            }
            let Some(last_activity) = self.registry.last_activity(&self.key).await else {
                // Deregistered elsewhere (supersession or disconnect).
                break;
            };

            state = state.check_pong(last_activity, Instant::now(), self.timeout);
            match state {
                HeartbeatState::Open => {
                    self.refresh_presence().await;
                    match self.handle.send(OutboundFrame::Ping) {
                        Ok(()) => state = HeartbeatState::AwaitingPong {
                            ping_sent: Instant::now(),
                        },
                        Err(_) => break,
                    }
                }
                HeartbeatState::AwaitingPong { .. } => {
                    // Still within the timeout; keep waiting.
                }
                HeartbeatState::TimedOut => {
                    counter!(m::HEARTBEAT_TIMEOUTS).increment(1);
                    tracing::info!(
                        room = %self.key.room,
                        user_id = %self.key.user_id,
                        "no pong within timeout, closing connection"
                    );
                    self.handle
                        .close(close_codes::HEARTBEAT_TIMEOUT, "heartbeat timeout");
                    self.registry
                        .deregister(&self.key, self.handle.connection_id())
                        .await;
                    break;
                }
                HeartbeatState::Closed => break,
            }
        }
    }

    async fn refresh_presence(&self) {
        if let Err(e) = self
            .presence
            .mark_online(self.company_id, self.key.user_id, self.presence_ttl)
            .await
        {
            tracing::warn!(user_id = %self.key.user_id, error = %e, "presence refresh failed");
        }
    }
}

/// Periodic dead-socket sweep.
///
/// Owned by the gateway lifecycle, not by any connection. Closes and
/// deregisters every connection whose `last_activity` is older than
/// `max_idle` (configured as `2 × heartbeat_timeout`).
pub async fn run_sweep(registry: Arc<ConnectionRegistry>, interval: Duration, max_idle: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let stale = registry.stale_connections(max_idle).await;
        if stale.is_empty() {
            continue;
        }
        tracing::info!(count = stale.len(), "sweeping dead connections");
        for (key, handle) in stale {
            counter!(m::HEARTBEAT_TIMEOUTS).increment(1);
            handle.close(close_codes::HEARTBEAT_TIMEOUT, "dead socket sweep");
            registry.deregister(&key, handle.connection_id()).await;
        }
    }
}
