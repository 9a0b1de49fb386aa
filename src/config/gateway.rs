use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

/// Tunables for connection lifecycle and delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Seconds between server-initiated heartbeat pings.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Seconds of silence after a ping before the connection is closed.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    /// Seconds between dead-socket sweep passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Connection attempts allowed per user within the window.
    #[serde(default = "default_rate_limit_max_attempts")]
    pub rate_limit_max_attempts: usize,

    /// Rate limit window, seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Bound of each connection's outbound frame queue.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Presence entry TTL, seconds. Refreshed on every heartbeat tick,
    /// so it must exceed the heartbeat interval.
    #[serde(default = "default_presence_ttl_secs")]
    pub presence_ttl_secs: u64,

    /// Seconds to wait after a disconnect before marking the user
    /// offline, absorbing quick reconnects.
    #[serde(default = "default_offline_grace_secs")]
    pub offline_grace_secs: u64,
}

impl GatewayConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// The sweep closes anything idle longer than twice the heartbeat
    /// timeout; the supervisor should have acted well before that.
    pub fn sweep_max_idle(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs * 2)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl_secs)
    }

    pub fn offline_grace(&self) -> Duration {
        Duration::from_secs(self.offline_grace_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            return Err(ConfigError::Invalid(
                "gateway.heartbeat_timeout_secs must be >= heartbeat_interval_secs".into(),
            ));
        }
        if self.presence_ttl_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::Invalid(
                "gateway.presence_ttl_secs must exceed heartbeat_interval_secs".into(),
            ));
        }
        if self.rate_limit_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "gateway.rate_limit_max_attempts must be positive".into(),
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "gateway.outbound_queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            rate_limit_max_attempts: default_rate_limit_max_attempts(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            presence_ttl_secs: default_presence_ttl_secs(),
            offline_grace_secs: default_offline_grace_secs(),
        }
    }
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_heartbeat_timeout_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_rate_limit_max_attempts() -> usize {
    10
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_outbound_queue_capacity() -> usize {
    100
}

fn default_presence_ttl_secs() -> u64 {
    90
}

fn default_offline_grace_secs() -> u64 {
    10
}
