//! The real-time messaging gateway.
//!
//! # Architecture
//!
//! ```text
//!        GET /ws/chat/:id        GET /ws/meetings/:id
//!               │                         │
//!               ▼                         ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ handler: accept → authenticate → authorize → serve  │
//! └─────────────────────────────────────────────────────┘
//!     │ admission          │ frames              │ liveness
//!     ▼                    ▼                     ▼
//! ┌──────────┐      ┌──────────────┐      ┌─────────────┐
//! │rate_limit│      │    router    │      │  heartbeat  │
//! └──────────┘      └──────────────┘      └─────────────┘
//!                          │
//!            local fast-path│      │publish
//!                          ▼      ▼
//!                   ┌──────────┐ ┌───────────┐
//!                   │ registry │ │ event bus │◄── bridge (other processes)
//!                   └──────────┘ └───────────┘
//! ```
//!
//! The registry is the single source of truth for live room membership;
//! every other component queries it rather than keeping its own copy.

pub mod bridge;
pub mod close_codes;
pub mod handler;
pub mod heartbeat;
pub mod rate_limit;
pub mod registry;
pub mod router;
pub mod session;

pub use bridge::BusBridge;
pub use handler::{gateway_router, GatewayState};
pub use heartbeat::{HeartbeatState, HeartbeatSupervisor};
pub use rate_limit::ConnectionRateLimiter;
pub use registry::{
    ConnectionHandle, ConnectionKey, ConnectionRegistry, DeliveryError, FanOutReport,
    OutboundFrame,
};
pub use router::MessageRouter;
pub use session::{Collaborators, RoomTarget, SessionManager};
