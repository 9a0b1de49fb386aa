//! Connection lifecycle: admission, serving, cleanup.
//!
//! A connection moves through CONNECTING (admission checks), REGISTERED
//! (in the registry, welcome frame sent), OPEN (frames flowing, liveness
//! supervised) and CLOSING (deregistered, presence grace running). The
//! admission pipeline is strict in order: authenticate, then rate-limit,
//! then authorize; each failure maps to its own close code so clients
//! can tell "log in again" from "back off" from "you don't belong here".

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::counter;
use tokio::sync::{mpsc, watch};

use crate::config::GatewayConfig;
use crate::domain::{
    ChannelId, ChatFrame, ErrorFrame, MeetingFrame, MeetingId, RoomKey, ServerFrame,
};
use crate::gateway::close_codes;
use crate::gateway::heartbeat::HeartbeatSupervisor;
use crate::gateway::rate_limit::ConnectionRateLimiter;
use crate::gateway::registry::{ConnectionHandle, ConnectionKey, ConnectionRegistry, OutboundFrame};
use crate::gateway::router::MessageRouter;
use crate::observability::metrics as m;
use crate::ports::{
    AuthClaims, AuthzError, ChatStore, MeetingStore, Notifier, PresenceStore, RoomAuthorizer,
    RoomEventPublisher, TokenError, TokenVerifier,
};

/// The external collaborators every session needs, behind their ports.
#[derive(Clone)]
pub struct Collaborators {
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub authorizer: Arc<dyn RoomAuthorizer>,
    pub chat_store: Arc<dyn ChatStore>,
    pub meeting_store: Arc<dyn MeetingStore>,
    pub notifier: Arc<dyn Notifier>,
    pub presence: Arc<dyn PresenceStore>,
    pub bus: Arc<dyn RoomEventPublisher>,
}

/// Which room a connection is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTarget {
    Chat(ChannelId),
    Meeting(MeetingId),
}

impl RoomTarget {
    pub fn room_key(self) -> RoomKey {
        match self {
            RoomTarget::Chat(channel_id) => RoomKey::chat(channel_id),
            RoomTarget::Meeting(meeting_id) => RoomKey::meeting(meeting_id),
        }
    }
}

/// Owns the shared gateway machinery and runs each connection's session.
pub struct SessionManager {
    registry: Arc<ConnectionRegistry>,
    rate_limiter: Arc<ConnectionRateLimiter>,
    router: Arc<MessageRouter>,
    collaborators: Collaborators,
    config: GatewayConfig,
    instance_id: String,
}

impl SessionManager {
    pub fn new(
        collaborators: Collaborators,
        config: GatewayConfig,
        instance_id: impl Into<String>,
    ) -> Self {
        let instance_id = instance_id.into();
        let registry = Arc::new(ConnectionRegistry::new());
        let rate_limiter = Arc::new(ConnectionRateLimiter::new(
            config.rate_limit_max_attempts,
            config.rate_limit_window(),
        ));
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&collaborators.bus),
            Arc::clone(&collaborators.presence),
            Arc::clone(&collaborators.chat_store),
            Arc::clone(&collaborators.meeting_store),
            Arc::clone(&collaborators.notifier),
            instance_id.clone(),
        ));
        Self {
            registry,
            rate_limiter,
            router,
            collaborators,
            config,
            instance_id,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn rate_limiter(&self) -> &Arc<ConnectionRateLimiter> {
        &self.rate_limiter
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn bus_healthy(&self) -> bool {
        self.collaborators.bus.is_healthy()
    }

    /// Runs the admission pipeline, returning the close code to reject
    /// with on failure. Order is fixed: authenticate, rate-limit,
    /// authorize, so an unauthenticated flood never consumes rate budget
    /// under a forged identity and a rate-limited user never triggers an
    /// authorization query.
    pub async fn admit(&self, target: RoomTarget, token: Option<&str>) -> Result<AuthClaims, u16> {
        let Some(token) = token else {
            return Err(close_codes::AUTH_FAILED);
        };

        let claims = match self.collaborators.token_verifier.verify(token).await {
            Ok(claims) => claims,
            Err(TokenError::Unavailable(e)) => {
                tracing::error!(error = %e, "auth collaborator unavailable");
                return Err(close_codes::INTERNAL_ERROR);
            }
            Err(e) => {
                tracing::info!(error = %e, "token rejected");
                return Err(close_codes::AUTH_FAILED);
            }
        };

        if !self.rate_limiter.allow(claims.user_id).await {
            tracing::info!(user_id = %claims.user_id, "connection attempt rate limited");
            return Err(close_codes::RATE_LIMITED);
        }

        let authorized = match target {
            RoomTarget::Chat(channel_id) => {
                self.collaborators
                    .authorizer
                    .is_channel_member(claims.user_id, channel_id)
                    .await
            }
            RoomTarget::Meeting(meeting_id) => {
                self.collaborators
                    .authorizer
                    .is_meeting_participant(claims.user_id, meeting_id)
                    .await
            }
        };
        match authorized {
            Ok(true) => Ok(claims),
            Ok(false) => {
                tracing::info!(user_id = %claims.user_id, room = %target.room_key(), "not a room member");
                Err(close_codes::UNAUTHORIZED_ROOM)
            }
            Err(AuthzError::Unavailable(e)) => {
                tracing::error!(error = %e, "authorization collaborator unavailable");
                Err(close_codes::INTERNAL_ERROR)
            }
        }
    }

    /// Serves one admitted connection until it closes.
    pub async fn serve(self: Arc<Self>, socket: WebSocket, target: RoomTarget, claims: AuthClaims) {
        let room = target.room_key();
        let key = ConnectionKey::new(room, claims.user_id);
        let (handle, rx) = ConnectionHandle::new(self.config.outbound_queue_capacity);
        let connection_id = handle.connection_id();

        if let Some(prior) = self.registry.register(key, handle.clone()).await {
            tracing::info!(
                room = %room,
                user_id = %claims.user_id,
                "superseding prior connection"
            );
            prior.close(close_codes::SUPERSEDED, "superseded by newer connection");
        }
        counter!(m::CONNECTIONS_OPENED, "room_type" => room.room_type.as_str()).increment(1);
        tracing::info!(room = %room, user_id = %claims.user_id, %connection_id, "connection open");

        if let Err(e) = self
            .collaborators
            .presence
            .mark_online(claims.company_id, claims.user_id, self.config.presence_ttl())
            .await
        {
            tracing::warn!(user_id = %claims.user_id, error = %e, "presence mark_online failed");
        }

        let welcome = ServerFrame::Connected {
            connection_id: connection_id.to_string(),
            room: room.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        if handle.send(OutboundFrame::Text(welcome.to_json())).is_err() {
            tracing::warn!(%connection_id, "welcome frame not queued");
        }

        // The writer flips this when it exits (close frame sent or sink
        // gone), which wakes the read loop even against a silent peer
        // that will never send its own close.
        let (closed_tx, closed_rx) = watch::channel(false);
        let (sink, stream) = socket.split();
        let writer = tokio::spawn(write_outbound(sink, rx, closed_tx));
        let heartbeat = tokio::spawn(
            HeartbeatSupervisor::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.collaborators.presence),
                key,
                claims.company_id,
                handle.clone(),
                self.config.heartbeat_interval(),
                self.config.heartbeat_timeout(),
                self.config.presence_ttl(),
            )
            .run(),
        );

        self.read_loop(stream, key, claims, target, &handle, closed_rx)
            .await;

        heartbeat.abort();
        let was_live = self.registry.deregister(&key, connection_id).await;
        // Dropping the last sender ends the writer task.
        drop(handle);
        let _ = writer.await;

        tracing::info!(room = %room, user_id = %claims.user_id, %connection_id, "connection closed");

        if was_live {
            self.router.announce_departure(room, claims.user_id).await;
            self.spawn_offline_grace(claims);
        }
    }

    /// Reads frames until the socket closes, errors, or the writer
    /// signals that a close frame went out. Every inbound frame counts
    /// as liveness; dispatch is strictly in arrival order.
    ///
    /// The `closed` signal is what makes forced closes (heartbeat
    /// timeout, supersession, sweep) deterministic: a dead peer never
    /// answers with its own close frame, so waiting on the stream alone
    /// would park this task forever.
    async fn read_loop<S>(
        &self,
        mut stream: S,
        key: ConnectionKey,
        claims: AuthClaims,
        target: RoomTarget,
        handle: &ConnectionHandle,
        mut closed: watch::Receiver<bool>,
    ) where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        loop {
            let message = tokio::select! {
                next = stream.next() => match next {
                    Some(message) => message,
                    None => break,
                },
                // Also ends if the writer dropped the sender entirely.
                _ = closed.changed() => break,
            };
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!(user_id = %claims.user_id, error = %e, "socket read error");
                    break;
                }
            };

            self.registry.touch(&key).await;

            match message {
                Message::Text(text) => {
                    self.dispatch(target, claims, &text, handle).await;
                }
                Message::Pong(_) | Message::Ping(_) => {
                    // Transport-level liveness; touch above covers it.
                }
                Message::Close(_) => break,
                Message::Binary(_) => {
                    send_error(handle, "UNSUPPORTED_FRAME", "binary frames are not supported");
                }
            }
        }
    }

    async fn dispatch(
        &self,
        target: RoomTarget,
        claims: AuthClaims,
        text: &str,
        handle: &ConnectionHandle,
    ) {
        match target {
            RoomTarget::Chat(channel_id) => match serde_json::from_str::<ChatFrame>(text) {
                Ok(frame) => self.router.handle_chat(channel_id, claims, frame).await,
                Err(e) => {
                    tracing::debug!(user_id = %claims.user_id, error = %e, "malformed chat frame");
                    send_error(handle, "MALFORMED_FRAME", "frame could not be parsed");
                }
            },
            RoomTarget::Meeting(meeting_id) => match serde_json::from_str::<MeetingFrame>(text) {
                Ok(frame) => self.router.handle_meeting(meeting_id, claims, frame).await,
                Err(e) => {
                    tracing::debug!(user_id = %claims.user_id, error = %e, "malformed meeting frame");
                    send_error(handle, "MALFORMED_FRAME", "frame could not be parsed");
                }
            },
        }
    }

    /// Marks the user offline after the grace period, unless they
    /// reconnected anywhere in the meantime.
    fn spawn_offline_grace(&self, claims: AuthClaims) {
        tokio::spawn(mark_offline_after_grace(
            Arc::clone(&self.registry),
            Arc::clone(&self.collaborators.presence),
            claims,
            self.config.offline_grace(),
        ));
    }
}

/// Waits out the grace period, then marks the user offline if they hold
/// no live connection anywhere. A reconnect inside the grace wins.
async fn mark_offline_after_grace(
    registry: Arc<ConnectionRegistry>,
    presence: Arc<dyn PresenceStore>,
    claims: AuthClaims,
    grace: Duration,
) {
    tokio::time::sleep(grace).await;
    if registry.is_user_connected(claims.user_id).await {
        return;
    }
    if let Err(e) = presence.mark_offline(claims.company_id, claims.user_id).await {
        tracing::warn!(user_id = %claims.user_id, error = %e, "presence mark_offline failed");
    }
}

fn send_error(handle: &ConnectionHandle, code: &str, message: &str) {
    let frame = ServerFrame::Error(ErrorFrame {
        code: code.to_string(),
        message: message.to_string(),
    });
    let _ = handle.send(OutboundFrame::Text(frame.to_json()));
}

/// Drains the outbound queue onto the socket. A `Close` frame ends the
/// task after the close is sent. On every exit path the `closed` signal
/// is flipped so the connection's read loop stops waiting on the peer.
async fn write_outbound<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<OutboundFrame>,
    closed: watch::Sender<bool>,
) where
    S: Sink<Message> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let result = match frame {
            OutboundFrame::Text(json) => sink.send(Message::Text(json)).await,
            OutboundFrame::Ping => {
                sink.send(Message::Text(ServerFrame::Ping.to_json())).await
            }
            OutboundFrame::Close { code, reason } => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        };
        if result.is_err() {
            break;
        }
    }
    let _ = closed.send(true);
}

/// Rejects an upgraded socket with an application close code.
pub async fn reject(socket: WebSocket, code: u16, reason: &'static str) {
    let mut socket = socket;
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
