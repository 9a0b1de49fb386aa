//! Adapters - concrete implementations of the ports.
//!
//! Production adapters speak to Postgres (persistence, authorization),
//! Redis (presence, event bus) and the platform's JWT issuer. Each port
//! also has an in-memory adapter used by tests and local development.

pub mod auth;
pub mod authorization;
pub mod event_bus;
pub mod notify;
pub mod persistence;
pub mod presence;
