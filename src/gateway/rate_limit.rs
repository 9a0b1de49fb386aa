//! Connection-attempt rate limiting.
//!
//! Sliding-window admission control per user, independent of rooms. Each
//! `allow` call purges attempts older than the window, checks the count
//! against the maximum, and records the new attempt if under it.
//!
//! Exceeding the limit is policy, not an error: the gateway closes that
//! attempt with the rate-limit close code and moves on; nothing is ever
//! retried server-side.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use metrics::counter;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::UserId;
use crate::observability::metrics as m;

/// Per-user sliding window of connection attempts.
///
/// Windows are purely in-memory; entries evict on the next `allow` call
/// for the user or during the periodic [`cleanup`](Self::cleanup) sweep
/// owned by the gateway lifecycle.
#[derive(Debug)]
pub struct ConnectionRateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<UserId, VecDeque<Instant>>>,
}

impl ConnectionRateLimiter {
    /// Creates a limiter allowing `max_attempts` per `window` per user.
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Default policy: 10 attempts per rolling 60 seconds.
    pub fn with_defaults() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// Whether a new connection attempt by `user_id` is admitted now.
    pub async fn allow(&self, user_id: UserId) -> bool {
        self.allow_at(user_id, Instant::now()).await
    }

    /// Window check at an explicit instant. The `allow` entry point uses
    /// the current time; tests drive this directly.
    pub async fn allow_at(&self, user_id: UserId, now: Instant) -> bool {
        let mut attempts = self.attempts.lock().await;
        let window = attempts.entry(user_id).or_default();

        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_attempts {
            counter!(m::RATE_LIMIT_REJECTIONS).increment(1);
            tracing::info!(user_id = %user_id, attempts = window.len(), "connection attempt rate-limited");
            return false;
        }

        window.push_back(now);
        true
    }

    /// Evicts users whose every attempt has aged out of the window.
    ///
    /// Runs as a gateway-owned background task so idle users do not pin
    /// memory forever.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, window| {
            window
                .back()
                .map(|last| now.duration_since(*last) < self.window)
                .unwrap_or(false)
        });
    }

    /// Number of users currently holding a window (for tests/metrics).
    pub async fn tracked_users(&self) -> usize {
        self.attempts.lock().await.len()
    }
}
