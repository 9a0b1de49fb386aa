//! Crewdeck Messaging Gateway
//!
//! Real-time WebSocket gateway for the Crewdeck workforce management
//! platform. Accepts connections for chat channels and live meetings,
//! supervises per-connection liveness, rate-limits connection attempts,
//! and fans out room events across processes via a pub/sub bus.
//!
//! Persistence, authorization, and notification are external collaborators
//! reached through the ports in [`ports`].

pub mod adapters;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod observability;
pub mod ports;
