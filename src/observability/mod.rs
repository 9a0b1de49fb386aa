//! Tracing, metrics and health reporting.

pub mod health;
pub mod metrics;

pub use health::HealthSnapshot;
pub use metrics::install_metrics_recorder;

/// Initialises the global tracing subscriber from `RUST_LOG`, defaulting
/// to info-level output for the crate itself.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crewdeck=debug"));

    fmt().with_env_filter(filter).with_target(true).init();
}
