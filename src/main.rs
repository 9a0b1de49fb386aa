use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crewdeck::adapters::auth::JwtVerifier;
use crewdeck::adapters::authorization::PostgresRoomAuthorizer;
use crewdeck::adapters::event_bus::{RedisEventBus, RedisEventSubscriber};
use crewdeck::adapters::notify::LoggingNotifier;
use crewdeck::adapters::persistence::PostgresWorkforceStore;
use crewdeck::adapters::presence::RedisPresenceStore;
use crewdeck::config::AppConfig;
use crewdeck::gateway::{
    gateway_router, heartbeat, BusBridge, Collaborators, GatewayState, SessionManager,
};
use crewdeck::observability;
use crewdeck::ports::{RoomEventHandler, RoomEventSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    observability::init_tracing();

    let config = AppConfig::load()?;
    let metrics_handle = observability::install_metrics_recorder()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await?;
    tracing::info!("database pool ready");

    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_tokio_connection().await?;
    tracing::info!("redis connection ready");

    let instance_id = format!("gw-{}", Uuid::new_v4());
    let bus_healthy = Arc::new(AtomicBool::new(true));

    let store = Arc::new(PostgresWorkforceStore::new(pool.clone()));
    let collaborators = Collaborators {
        token_verifier: Arc::new(JwtVerifier::new(
            &config.auth.jwt_secret,
            &config.auth.jwt_issuer,
        )),
        authorizer: Arc::new(PostgresRoomAuthorizer::new(pool)),
        chat_store: store.clone(),
        meeting_store: store,
        notifier: Arc::new(LoggingNotifier::new()),
        presence: Arc::new(RedisPresenceStore::new(redis_conn.clone())),
        bus: Arc::new(RedisEventBus::new(redis_conn, Arc::clone(&bus_healthy))),
    };

    let sessions = Arc::new(SessionManager::new(
        collaborators,
        config.gateway.clone(),
        instance_id.clone(),
    ));

    // Bus subscriber feeding the local registry.
    let bridge: Arc<dyn RoomEventHandler> =
        Arc::new(BusBridge::new(instance_id.clone(), Arc::clone(sessions.registry())));
    let subscriber = RedisEventSubscriber::new(
        redis_client,
        bus_healthy,
        config.redis.max_reconnect_attempts,
        Duration::from_millis(config.redis.reconnect_base_ms),
    );
    tokio::spawn(async move { subscriber.run(bridge).await });

    // Dead-socket sweep backstopping the per-connection supervisors.
    tokio::spawn(heartbeat::run_sweep(
        Arc::clone(sessions.registry()),
        config.gateway.sweep_interval(),
        config.gateway.sweep_max_idle(),
    ));

    // Rate limiter bookkeeping: windows empty out on their own, entries
    // for departed users need reaping.
    let rate_limiter = Arc::clone(sessions.rate_limiter());
    let cleanup_every = config.gateway.rate_limit_window();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_every);
        loop {
            ticker.tick().await;
            rate_limiter.cleanup().await;
        }
    });

    let state = GatewayState {
        sessions,
        metrics: Some(metrics_handle),
    };
    let app = gateway_router(state);

    let addr = config.server.bind_addr();
    tracing::info!(%addr, %instance_id, "gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
