//! HTTP surface: the two WebSocket upgrade routes plus health and
//! metrics endpoints.
//!
//! Admission runs after the protocol upgrade so rejected clients get an
//! application close code they can inspect, not an opaque HTTP status.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::{ChannelId, MeetingId};
use crate::gateway::close_codes;
use crate::gateway::session::{self, RoomTarget, SessionManager};
use crate::observability::HealthSnapshot;

#[derive(Clone)]
pub struct GatewayState {
    pub sessions: Arc<SessionManager>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws/chat/:channel_id", get(chat_upgrade))
        .route("/ws/meetings/:meeting_id", get(meeting_upgrade))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn chat_upgrade(
    State(state): State<GatewayState>,
    Path(channel_id): Path<i64>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, RoomTarget::Chat(ChannelId::new(channel_id)), query.token)
}

async fn meeting_upgrade(
    State(state): State<GatewayState>,
    Path(meeting_id): Path<i64>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(state, ws, RoomTarget::Meeting(MeetingId::new(meeting_id)), query.token)
}

fn upgrade(
    state: GatewayState,
    ws: WebSocketUpgrade,
    target: RoomTarget,
    token: Option<String>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        match state.sessions.admit(target, token.as_deref()).await {
            Ok(claims) => Arc::clone(&state.sessions).serve(socket, target, claims).await,
            Err(code) => session::reject(socket, code, close_reason(code)).await,
        }
    })
}

fn close_reason(code: u16) -> &'static str {
    match code {
        close_codes::AUTH_FAILED => "authentication failed",
        close_codes::UNAUTHORIZED_ROOM => "not a member of this room",
        close_codes::RATE_LIMITED => "too many connection attempts",
        close_codes::HEARTBEAT_TIMEOUT => "heartbeat timeout",
        close_codes::SUPERSEDED => "superseded by newer connection",
        _ => "internal error",
    }
}

async fn health(State(state): State<GatewayState>) -> Json<HealthSnapshot> {
    let active = state.sessions.registry().active_count().await;
    Json(HealthSnapshot::new(state.sessions.bus_healthy(), active))
}

async fn render_metrics(State(state): State<GatewayState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_close_code_has_a_reason() {
        for code in [
            close_codes::AUTH_FAILED,
            close_codes::UNAUTHORIZED_ROOM,
            close_codes::RATE_LIMITED,
            close_codes::HEARTBEAT_TIMEOUT,
            close_codes::SUPERSEDED,
            close_codes::INTERNAL_ERROR,
        ] {
            assert!(!close_reason(code).is_empty());
        }
    }
}
