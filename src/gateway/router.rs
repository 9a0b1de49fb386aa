//! Inbound frame dispatch for chat and meeting rooms.
//!
//! One router instance serves every connection. Frames from a single
//! connection are dispatched strictly in arrival order because the serve
//! loop awaits each `handle_*` call before reading the next frame;
//! cross-connection interleaving within a room is unordered, which is why
//! reaction persistence is idempotent.
//!
//! # Fan-out
//!
//! Every room broadcast takes the dual path: direct delivery to locally
//! registered sockets through the registry (fast path) and a publish to
//! the event bus for connections held by other processes. The sender is
//! excluded on both paths. Publishing is fire-and-forget: a bus failure
//! is logged and never blocks or fails frame handling.

use std::sync::Arc;

use metrics::counter;
use serde_json::{json, Value};

use crate::domain::{
    ChannelId, ChatFrame, ErrorFrame, MeetingFrame, MeetingId, ReactionAction, RoomEvent, RoomKey,
    ServerFrame, UserId,
};
use crate::gateway::registry::{ConnectionKey, ConnectionRegistry, OutboundFrame};
use crate::observability::metrics as m;
use crate::ports::{
    AuthClaims, ChatStore, MeetingStore, Notifier, ParticipantChange, PresenceStore,
    RoomEventPublisher, StoreError,
};

/// Routes inbound frames to room-type-specific handlers.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    bus: Arc<dyn RoomEventPublisher>,
    presence: Arc<dyn PresenceStore>,
    chat_store: Arc<dyn ChatStore>,
    meeting_store: Arc<dyn MeetingStore>,
    notifier: Arc<dyn Notifier>,
    instance_id: String,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        bus: Arc<dyn RoomEventPublisher>,
        presence: Arc<dyn PresenceStore>,
        chat_store: Arc<dyn ChatStore>,
        meeting_store: Arc<dyn MeetingStore>,
        notifier: Arc<dyn Notifier>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            bus,
            presence,
            chat_store,
            meeting_store,
            notifier,
            instance_id: instance_id.into(),
        }
    }

    /// Handles one frame on a chat channel connection.
    pub async fn handle_chat(&self, channel_id: ChannelId, sender: AuthClaims, frame: ChatFrame) {
        let room = RoomKey::chat(channel_id);
        match frame {
            ChatFrame::Ping => {
                counter!(m::MESSAGES, "room_type" => "chat", "type" => "ping").increment(1);
                self.reply(&room, sender.user_id, ServerFrame::Pong).await;
            }
            ChatFrame::Pong => {
                // Liveness only; the serve loop already touched the registry.
                counter!(m::MESSAGES, "room_type" => "chat", "type" => "pong").increment(1);
            }
            ChatFrame::Typing { is_typing } => {
                counter!(m::MESSAGES, "room_type" => "chat", "type" => "typing").increment(1);
                self.broadcast(
                    room,
                    sender.user_id,
                    json!({
                        "type": "typing",
                        "user_id": sender.user_id,
                        "is_typing": is_typing,
                    }),
                )
                .await;
            }
            ChatFrame::ReadReceipt => {
                counter!(m::MESSAGES, "room_type" => "chat", "type" => "read_receipt").increment(1);
                match self.chat_store.mark_read(channel_id, sender.user_id).await {
                    Ok(()) => {
                        self.broadcast(
                            room,
                            sender.user_id,
                            json!({
                                "type": "read_receipt",
                                "channel_id": channel_id,
                                "user_id": sender.user_id,
                            }),
                        )
                        .await;
                    }
                    Err(e) => self.handler_failed(&room, sender.user_id, "read_receipt", e).await,
                }
            }
            ChatFrame::Reaction { reaction } => {
                counter!(m::MESSAGES, "room_type" => "chat", "type" => "reaction").increment(1);
                let result = match reaction.action {
                    ReactionAction::Add => {
                        self.chat_store.add_reaction(sender.user_id, &reaction).await
                    }
                    ReactionAction::Remove => {
                        self.chat_store.remove_reaction(sender.user_id, &reaction).await
                    }
                };
                match result {
                    Ok(()) => {
                        self.broadcast(
                            room,
                            sender.user_id,
                            json!({
                                "type": "reaction",
                                "user_id": sender.user_id,
                                "reaction": reaction,
                            }),
                        )
                        .await;
                    }
                    Err(e) => self.handler_failed(&room, sender.user_id, "reaction", e).await,
                }
            }
            ChatFrame::Message { message, channel_id: claimed } => {
                counter!(m::MESSAGES, "room_type" => "chat", "type" => "message").increment(1);
                if let Some(claimed) = claimed {
                    if claimed != channel_id {
                        // The path parameter is authoritative.
                        tracing::warn!(
                            claimed = %claimed,
                            actual = %channel_id,
                            "message frame claimed a different channel, ignoring claim"
                        );
                    }
                }
                // Persist first; an unsaved message is never broadcast.
                match self
                    .chat_store
                    .save_message(channel_id, sender.user_id, message)
                    .await
                {
                    Ok(saved) => {
                        self.broadcast(
                            room,
                            sender.user_id,
                            json!({ "type": "message", "message": saved }),
                        )
                        .await;

                        let notifier = Arc::clone(&self.notifier);
                        tokio::spawn(async move {
                            notifier.message_saved(&saved).await;
                        });
                    }
                    Err(e) => self.handler_failed(&room, sender.user_id, "message", e).await,
                }
            }
        }
    }

    /// Handles one frame on a meeting connection.
    pub async fn handle_meeting(&self, meeting_id: MeetingId, sender: AuthClaims, frame: MeetingFrame) {
        let room = RoomKey::meeting(meeting_id);
        match frame {
            MeetingFrame::Ping => {
                counter!(m::MESSAGES, "room_type" => "meeting", "type" => "ping").increment(1);
                self.reply(&room, sender.user_id, ServerFrame::Pong).await;
            }
            MeetingFrame::Pong => {
                counter!(m::MESSAGES, "room_type" => "meeting", "type" => "pong").increment(1);
            }
            // WebRTC signaling is relayed as-is; the gateway is a dumb
            // relay and never interprets the payload.
            MeetingFrame::Offer { data } => {
                self.relay_signal(room, sender.user_id, "offer", data).await;
            }
            MeetingFrame::Answer { data } => {
                self.relay_signal(room, sender.user_id, "answer", data).await;
            }
            MeetingFrame::IceCandidate { data } => {
                self.relay_signal(room, sender.user_id, "ice-candidate", data).await;
            }
            MeetingFrame::Presence => {
                counter!(m::MESSAGES, "room_type" => "meeting", "type" => "presence").increment(1);
                match self.presence.online_users(sender.company_id).await {
                    Ok(online) => {
                        self.reply(&room, sender.user_id, ServerFrame::Presence { online })
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %sender.user_id, error = %e, "presence query failed");
                        self.reply(
                            &room,
                            sender.user_id,
                            ServerFrame::Error(ErrorFrame {
                                code: "PRESENCE_UNAVAILABLE".to_string(),
                                message: "presence is temporarily unavailable".to_string(),
                            }),
                        )
                        .await;
                    }
                }
            }
            MeetingFrame::JoinMeeting => {
                self.participant_change(room, meeting_id, sender.user_id, ParticipantChange::Joined)
                    .await;
            }
            MeetingFrame::LeaveMeeting => {
                self.participant_change(room, meeting_id, sender.user_id, ParticipantChange::Left)
                    .await;
            }
        }
    }

    /// Tells the remaining room members that a user's connection is gone.
    ///
    /// Called by the gateway during `CLOSING`, after deregistration.
    pub async fn announce_departure(&self, room: RoomKey, user_id: UserId) {
        self.broadcast(
            room,
            user_id,
            json!({ "type": "user_disconnected", "user_id": user_id }),
        )
        .await;
    }

    async fn relay_signal(&self, room: RoomKey, sender_id: UserId, kind: &'static str, data: Value) {
        counter!(m::MESSAGES, "room_type" => "meeting", "type" => kind).increment(1);
        self.broadcast(
            room,
            sender_id,
            json!({ "type": kind, "sender_id": sender_id, "data": data }),
        )
        .await;
    }

    async fn participant_change(
        &self,
        room: RoomKey,
        meeting_id: MeetingId,
        user_id: UserId,
        change: ParticipantChange,
    ) {
        counter!(m::MESSAGES, "room_type" => "meeting", "type" => change.event_type()).increment(1);
        match self
            .meeting_store
            .update_participant(meeting_id, user_id, change)
            .await
        {
            Ok(()) => {
                self.broadcast(
                    room,
                    user_id,
                    json!({ "type": change.event_type(), "user_id": user_id }),
                )
                .await;
            }
            Err(e) => self.handler_failed(&room, user_id, change.event_type(), e).await,
        }
    }

    /// Dual-path fan-out: local fast-path via the registry plus a
    /// fire-and-forget publish for other processes. Excludes the sender
    /// on both paths.
    async fn broadcast(&self, room: RoomKey, sender_id: UserId, payload: Value) {
        let json = payload.to_string();
        let report = self.registry.fan_out(&room, &json, Some(sender_id)).await;
        tracing::debug!(
            room = %room,
            sender_id = %sender_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "room broadcast"
        );

        let event = RoomEvent::new(self.instance_id.clone(), room, sender_id, payload);
        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            if let Err(e) = bus.publish(room, &event).await {
                counter!(m::BUS_PUBLISH_FAILURES).increment(1);
                tracing::warn!(room = %room, error = %e, "bus publish failed, local delivery only");
            }
        });
    }

    /// Sends a frame to one connection only.
    async fn reply(&self, room: &RoomKey, user_id: UserId, frame: ServerFrame) {
        let key = ConnectionKey::new(*room, user_id);
        if let Some(handle) = self.registry.handle_for(&key).await {
            if let Err(e) = handle.send(OutboundFrame::Text(frame.to_json())) {
                tracing::debug!(room = %room, user_id = %user_id, error = %e, "reply not delivered");
            }
        }
    }

    /// Fail closed: log, tell the sender, broadcast nothing. The
    /// connection stays open so the client can retry.
    async fn handler_failed(&self, room: &RoomKey, user_id: UserId, kind: &str, error: StoreError) {
        tracing::error!(room = %room, user_id = %user_id, kind, error = %error, "handler failed");
        self.reply(
            room,
            user_id,
            ServerFrame::Error(ErrorFrame {
                code: "HANDLER_FAILED".to_string(),
                message: format!("{kind} could not be processed"),
            }),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::event_bus::InMemoryEventBus;
    use crate::adapters::notify::LoggingNotifier;
    use crate::adapters::persistence::InMemoryWorkforceStore;
    use crate::adapters::presence::InMemoryPresenceStore;
    use crate::domain::ReactionPayload;
    use crate::gateway::registry::ConnectionHandle;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        bus: Arc<InMemoryEventBus>,
        store: Arc<InMemoryWorkforceStore>,
        presence: Arc<InMemoryPresenceStore>,
        router: MessageRouter,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let store = Arc::new(InMemoryWorkforceStore::new());
        let presence = Arc::new(InMemoryPresenceStore::new());
        let router = MessageRouter::new(
            Arc::clone(&registry),
            bus.clone() as Arc<dyn RoomEventPublisher>,
            presence.clone() as Arc<dyn PresenceStore>,
            store.clone() as Arc<dyn ChatStore>,
            store.clone() as Arc<dyn MeetingStore>,
            Arc::new(LoggingNotifier::new()),
            "gw-test",
        );
        Fixture {
            registry,
            bus,
            store,
            presence,
            router,
        }
    }

    fn claims(user_id: i64) -> AuthClaims {
        AuthClaims {
            user_id: UserId::new(user_id),
            company_id: crate::domain::CompanyId::new(1),
        }
    }

    async fn connect(
        fixture: &Fixture,
        room: RoomKey,
        user_id: i64,
    ) -> mpsc::Receiver<OutboundFrame> {
        let (handle, rx) = ConnectionHandle::new(32);
        fixture
            .registry
            .register(ConnectionKey::new(room, UserId::new(user_id)), handle)
            .await;
        rx
    }

    fn expect_text(frame: Option<OutboundFrame>) -> serde_json::Value {
        match frame {
            Some(OutboundFrame::Text(json)) => serde_json::from_str(&json).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_is_persisted_then_broadcast_to_everyone_but_sender() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let mut rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.router
            .handle_chat(
                ChannelId::new(7),
                claims(1),
                ChatFrame::Message {
                    message: json!({"text": "hello"}),
                    channel_id: None,
                },
            )
            .await;

        let received = expect_text(rx_b.recv().await);
        assert_eq!(received["type"], "message");
        assert_eq!(received["message"]["body"]["text"], "hello");
        assert!(rx_a.try_recv().is_err(), "sender must not receive an echo");
        assert_eq!(f.store.saved_messages().len(), 1);
    }

    #[tokio::test]
    async fn failed_persistence_broadcasts_nothing_and_reports_to_sender() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let mut rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.store.fail_next_write();
        f.router
            .handle_chat(
                ChannelId::new(7),
                claims(1),
                ChatFrame::Message {
                    message: json!({"text": "lost"}),
                    channel_id: None,
                },
            )
            .await;

        let error = expect_text(rx_a.recv().await);
        assert_eq!(error["type"], "error");
        assert!(rx_b.try_recv().is_err(), "unsaved content must not be shown");
        assert!(f.store.saved_messages().is_empty());
    }

    #[tokio::test]
    async fn typing_is_rebroadcast_without_persistence() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let _rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.router
            .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Typing { is_typing: true })
            .await;

        let received = expect_text(rx_b.recv().await);
        assert_eq!(received["type"], "typing");
        assert_eq!(received["user_id"], 1);
        assert_eq!(received["is_typing"], true);
    }

    #[tokio::test]
    async fn frames_dispatch_in_arrival_order() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let _rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.router
            .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Typing { is_typing: true })
            .await;
        f.router
            .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Typing { is_typing: false })
            .await;
        f.router
            .handle_chat(
                ChannelId::new(7),
                claims(1),
                ChatFrame::Message {
                    message: json!({"text": "hi"}),
                    channel_id: None,
                },
            )
            .await;

        assert_eq!(expect_text(rx_b.recv().await)["is_typing"], true);
        assert_eq!(expect_text(rx_b.recv().await)["is_typing"], false);
        assert_eq!(expect_text(rx_b.recv().await)["type"], "message");
    }

    #[tokio::test]
    async fn ping_gets_a_pong_reply_to_sender_only() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let mut rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.router.handle_chat(ChannelId::new(7), claims(1), ChatFrame::Ping).await;

        assert_eq!(expect_text(rx_a.recv().await)["type"], "pong");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn reaction_add_persists_and_rebroadcasts() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let _rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        let reaction = ReactionPayload {
            action: ReactionAction::Add,
            message_id: 5,
            emoji: "🎉".to_string(),
        };
        f.router
            .handle_chat(
                ChannelId::new(7),
                claims(1),
                ChatFrame::Reaction { reaction: reaction.clone() },
            )
            .await;
        // Replay of the same add is a no-op, not a failure.
        f.router
            .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Reaction { reaction })
            .await;

        let received = expect_text(rx_b.recv().await);
        assert_eq!(received["type"], "reaction");
        assert_eq!(received["reaction"]["emoji"], "🎉");
        assert_eq!(f.store.reaction_count(5, "🎉"), 1);
    }

    #[tokio::test]
    async fn signaling_is_relayed_verbatim_minus_sender() {
        let f = fixture();
        let room = RoomKey::meeting(MeetingId::new(3));
        let mut rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        let sdp = json!({"sdp": "v=0...", "nested": {"deep": [1, 2, 3]}});
        f.router
            .handle_meeting(MeetingId::new(3), claims(1), MeetingFrame::Offer { data: sdp.clone() })
            .await;

        let received = expect_text(rx_b.recv().await);
        assert_eq!(received["type"], "offer");
        assert_eq!(received["sender_id"], 1);
        assert_eq!(received["data"], sdp, "signaling payload must not be altered");
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn presence_query_replies_to_sender_only() {
        let f = fixture();
        let room = RoomKey::meeting(MeetingId::new(3));
        let mut rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.presence
            .mark_online(crate::domain::CompanyId::new(1), UserId::new(2), Duration::from_secs(60))
            .await
            .unwrap();

        f.router
            .handle_meeting(MeetingId::new(3), claims(1), MeetingFrame::Presence)
            .await;

        let received = expect_text(rx_a.recv().await);
        assert_eq!(received["type"], "presence");
        assert_eq!(received["online"], json!([2]));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_meeting_persists_and_broadcasts_membership_change() {
        let f = fixture();
        let room = RoomKey::meeting(MeetingId::new(3));
        let _rx_a = connect(&f, room, 1).await;
        let mut rx_b = connect(&f, room, 2).await;

        f.router
            .handle_meeting(MeetingId::new(3), claims(1), MeetingFrame::JoinMeeting)
            .await;

        let received = expect_text(rx_b.recv().await);
        assert_eq!(received["type"], "participant_joined");
        assert_eq!(received["user_id"], 1);
        assert_eq!(
            f.store.participant_changes(),
            vec![(MeetingId::new(3), UserId::new(1), ParticipantChange::Joined)]
        );
    }

    #[tokio::test]
    async fn broadcast_also_publishes_to_the_bus() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let _rx_a = connect(&f, room, 1).await;

        f.router
            .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Typing { is_typing: true })
            .await;

        // Publishing is spawned; give it a tick.
        tokio::task::yield_now().await;
        let published = f.bus.published_events();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].room, room);
        assert_eq!(published[0].origin, "gw-test");
    }

    #[tokio::test]
    async fn departure_announcement_reaches_remaining_members() {
        let f = fixture();
        let room = RoomKey::chat(ChannelId::new(7));
        let mut rx_b = connect(&f, room, 2).await;

        f.router.announce_departure(room, UserId::new(1)).await;

        let received = expect_text(rx_b.recv().await);
        assert_eq!(received["type"], "user_disconnected");
        assert_eq!(received["user_id"], 1);
    }
}
