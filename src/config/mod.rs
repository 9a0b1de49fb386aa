//! Application configuration.
//!
//! Loaded from environment variables with the `CREWDECK` prefix and `__`
//! as the section separator, e.g. `CREWDECK__SERVER__PORT=8080` or
//! `CREWDECK__GATEWAY__HEARTBEAT_INTERVAL_SECS=30`. Every field has a
//! default, so an empty environment yields a runnable local config
//! (pointing at localhost Postgres and Redis).

mod auth;
mod database;
mod error;
mod gateway;
mod redis;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use gateway::GatewayConfig;
pub use redis::RedisConfig;
pub use server::ServerConfig;

use config::{Config, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Loads configuration from the environment and validates it.
    pub fn load() -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(Environment::with_prefix("CREWDECK").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.gateway.validate()?;
        self.auth.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}
