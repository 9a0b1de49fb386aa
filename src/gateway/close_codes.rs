//! Application-level WebSocket close codes.
//!
//! Layered over the transport's close mechanism in the 4000-4999 range
//! reserved for applications. Each code is stable so clients can tell
//! retry-worthy closes (heartbeat timeout) from terminal ones
//! (unauthorized room).

/// Bearer token missing, malformed, or expired. Do not retry as-is.
pub const AUTH_FAILED: u16 = 4001;

/// Authenticated, but not a member of the requested room. Do not retry.
pub const UNAUTHORIZED_ROOM: u16 = 4003;

/// Too many connection attempts inside the sliding window. Retry later.
pub const RATE_LIMITED: u16 = 4008;

/// No pong within the heartbeat timeout. Reconnecting is expected.
pub const HEARTBEAT_TIMEOUT: u16 = 4009;

/// A newer connection for the same (room, user) key took over.
pub const SUPERSEDED: u16 = 4010;

/// Unexpected gateway-side failure. Retrying is reasonable.
pub const INTERNAL_ERROR: u16 = 4011;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_and_in_application_range() {
        let codes = [
            AUTH_FAILED,
            UNAUTHORIZED_ROOM,
            RATE_LIMITED,
            HEARTBEAT_TIMEOUT,
            SUPERSEDED,
            INTERNAL_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!((4000..5000).contains(a));
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
