//! Cross-module scenarios: two gateway "instances" wired to one
//! in-process bus, exercising the dual-path fan-out, supersession and
//! backpressure behavior end to end.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use crewdeck::adapters::auth::MockTokenVerifier;
use crewdeck::adapters::authorization::StaticRoomAuthorizer;
use crewdeck::adapters::event_bus::InMemoryEventBus;
use crewdeck::adapters::notify::LoggingNotifier;
use crewdeck::adapters::persistence::InMemoryWorkforceStore;
use crewdeck::adapters::presence::InMemoryPresenceStore;
use crewdeck::config::GatewayConfig;
use crewdeck::domain::{ChannelId, ChatFrame, CompanyId, MeetingId, RoomKey, UserId};
use crewdeck::gateway::close_codes;
use crewdeck::gateway::{
    BusBridge, Collaborators, ConnectionHandle, ConnectionKey, ConnectionRegistry, MessageRouter,
    OutboundFrame, RoomTarget, SessionManager,
};
use crewdeck::ports::{
    AuthClaims, ChatStore, MeetingStore, PresenceStore, RoomEventHandler, RoomEventPublisher,
    RoomEventSubscriber,
};

/// One gateway process: its own registry, router and bus bridge.
struct Instance {
    registry: Arc<ConnectionRegistry>,
    router: MessageRouter,
}

fn instance(id: &str, bus: &Arc<InMemoryEventBus>, store: &Arc<InMemoryWorkforceStore>) -> Instance {
    let registry = Arc::new(ConnectionRegistry::new());
    let router = MessageRouter::new(
        Arc::clone(&registry),
        Arc::clone(bus) as Arc<dyn RoomEventPublisher>,
        Arc::new(InMemoryPresenceStore::new()) as Arc<dyn PresenceStore>,
        Arc::clone(store) as Arc<dyn ChatStore>,
        Arc::clone(store) as Arc<dyn MeetingStore>,
        Arc::new(LoggingNotifier::new()),
        id,
    );
    Instance { registry, router }
}

fn spawn_bridge(id: &str, instance: &Instance, bus: &Arc<InMemoryEventBus>) -> tokio::task::JoinHandle<()> {
    let bridge: Arc<dyn RoomEventHandler> =
        Arc::new(BusBridge::new(id, Arc::clone(&instance.registry)));
    let subscriber = bus.subscriber();
    tokio::spawn(async move { subscriber.run(bridge).await })
}

async fn connect(
    instance: &Instance,
    room: RoomKey,
    user_id: i64,
    capacity: usize,
) -> mpsc::Receiver<OutboundFrame> {
    let (handle, rx) = ConnectionHandle::new(capacity);
    instance
        .registry
        .register(ConnectionKey::new(room, UserId::new(user_id)), handle)
        .await;
    rx
}

fn claims(user_id: i64) -> AuthClaims {
    AuthClaims {
        user_id: UserId::new(user_id),
        company_id: CompanyId::new(1),
    }
}

async fn recv_json(rx: &mut mpsc::Receiver<OutboundFrame>) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("channel closed");
    match frame {
        OutboundFrame::Text(json) => serde_json::from_str(&json).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn room_events_cross_instances_through_the_bus() {
    let bus = Arc::new(InMemoryEventBus::new());
    let store = Arc::new(InMemoryWorkforceStore::new());
    let gw_a = instance("gw-a", &bus, &store);
    let gw_b = instance("gw-b", &bus, &store);
    let bridge_b = spawn_bridge("gw-b", &gw_b, &bus);

    let room = RoomKey::chat(ChannelId::new(7));
    let mut rx_a = connect(&gw_a, room, 1, 32).await;
    let mut rx_b = connect(&gw_b, room, 2, 32).await;

    gw_a.router
        .handle_chat(
            ChannelId::new(7),
            claims(1),
            ChatFrame::Message {
                message: json!({"text": "hello"}),
                channel_id: None,
            },
        )
        .await;

    let received = recv_json(&mut rx_b).await;
    assert_eq!(received["type"], "message");
    assert_eq!(received["message"]["body"]["text"], "hello");
    assert!(rx_a.try_recv().is_err(), "sender must not see an echo");

    bridge_b.abort();
}

#[tokio::test]
async fn publishing_instance_skips_its_own_bus_echo() {
    let bus = Arc::new(InMemoryEventBus::new());
    let store = Arc::new(InMemoryWorkforceStore::new());
    let gw_a = instance("gw-a", &bus, &store);
    // The instance subscribes to the bus it also publishes on.
    let bridge_a = spawn_bridge("gw-a", &gw_a, &bus);

    let room = RoomKey::chat(ChannelId::new(7));
    let mut rx_b = connect(&gw_a, room, 2, 32).await;

    gw_a.router
        .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Typing { is_typing: true })
        .await;

    // Exactly one delivery: the local fast-path. The bus echo is skipped.
    let received = recv_json(&mut rx_b).await;
    assert_eq!(received["type"], "typing");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx_b.try_recv().is_err(), "bus echo must not duplicate delivery");

    bridge_a.abort();
}

#[tokio::test]
async fn event_order_is_preserved_across_the_bus() {
    let bus = Arc::new(InMemoryEventBus::new());
    let store = Arc::new(InMemoryWorkforceStore::new());
    let gw_a = instance("gw-a", &bus, &store);
    let gw_b = instance("gw-b", &bus, &store);
    let bridge_b = spawn_bridge("gw-b", &gw_b, &bus);

    let room = RoomKey::chat(ChannelId::new(7));
    let mut rx_b = connect(&gw_b, room, 2, 32).await;

    for i in 0..5 {
        gw_a.router
            .handle_chat(
                ChannelId::new(7),
                claims(1),
                ChatFrame::Message {
                    message: json!({"seq": i}),
                    channel_id: None,
                },
            )
            .await;
    }

    for i in 0..5 {
        let received = recv_json(&mut rx_b).await;
        assert_eq!(received["message"]["body"]["seq"], i);
    }

    bridge_b.abort();
}

#[tokio::test]
async fn full_queue_degrades_only_the_slow_recipient() {
    let bus = Arc::new(InMemoryEventBus::new());
    let store = Arc::new(InMemoryWorkforceStore::new());
    let gw = instance("gw-a", &bus, &store);

    let room = RoomKey::chat(ChannelId::new(7));
    // Slow consumer: queue of one that nobody drains.
    let mut rx_slow = connect(&gw, room, 2, 1).await;
    let mut rx_healthy = connect(&gw, room, 3, 32).await;

    for i in 0..3 {
        gw.router
            .handle_chat(ChannelId::new(7), claims(1), ChatFrame::Typing { is_typing: i % 2 == 0 })
            .await;
    }

    // Healthy recipient got everything.
    for _ in 0..3 {
        assert_eq!(recv_json(&mut rx_healthy).await["type"], "typing");
    }
    // The slow one got the first event; the rest were dropped, and the
    // connection itself is still registered.
    assert_eq!(recv_json(&mut rx_slow).await["type"], "typing");
    assert!(rx_slow.try_recv().is_err());
    assert!(gw.registry.is_user_connected(UserId::new(2)).await);
}

#[tokio::test]
async fn superseded_connection_is_closed_and_its_cleanup_is_harmless() {
    let registry = Arc::new(ConnectionRegistry::new());
    let room = RoomKey::chat(ChannelId::new(7));
    let key = ConnectionKey::new(room, UserId::new(1));

    let (first, mut first_rx) = ConnectionHandle::new(8);
    let first_id = first.connection_id();
    registry.register(key, first.clone()).await;

    let (second, _second_rx) = ConnectionHandle::new(8);
    let prior = registry.register(key, second.clone()).await.expect("prior handle");
    prior.close(close_codes::SUPERSEDED, "superseded by newer connection");

    match first_rx.recv().await {
        Some(OutboundFrame::Close { code, .. }) => assert_eq!(code, close_codes::SUPERSEDED),
        other => panic!("expected close, got {other:?}"),
    }

    // The old connection's cleanup must not evict its successor.
    assert!(!registry.deregister(&key, first_id).await);
    assert_eq!(
        registry.handle_for(&key).await.map(|h| h.connection_id()),
        Some(second.connection_id())
    );
}

fn session_manager() -> SessionManager {
    let store = Arc::new(InMemoryWorkforceStore::new());
    let verifier = Arc::new(MockTokenVerifier::new());
    verifier.allow("alice", claims(1));
    let authorizer = Arc::new(StaticRoomAuthorizer::new());
    authorizer.allow_channel(ChannelId::new(7), UserId::new(1));

    SessionManager::new(
        Collaborators {
            token_verifier: verifier,
            authorizer,
            chat_store: store.clone(),
            meeting_store: store,
            notifier: Arc::new(LoggingNotifier::new()),
            presence: Arc::new(InMemoryPresenceStore::new()),
            bus: Arc::new(InMemoryEventBus::new()),
        },
        GatewayConfig::default(),
        "gw-test",
    )
}

#[tokio::test]
async fn admission_maps_each_failure_to_its_close_code() {
    let manager = session_manager();

    assert_eq!(
        manager.admit(RoomTarget::Chat(ChannelId::new(7)), None).await,
        Err(close_codes::AUTH_FAILED)
    );
    assert_eq!(
        manager
            .admit(RoomTarget::Chat(ChannelId::new(7)), Some("wrong"))
            .await,
        Err(close_codes::AUTH_FAILED)
    );
    assert_eq!(
        manager
            .admit(RoomTarget::Meeting(MeetingId::new(1)), Some("alice"))
            .await,
        Err(close_codes::UNAUTHORIZED_ROOM)
    );
    assert!(manager
        .admit(RoomTarget::Chat(ChannelId::new(7)), Some("alice"))
        .await
        .is_ok());
}

#[tokio::test]
async fn rate_limit_rejects_before_any_registration_happens() {
    let manager = session_manager();

    for _ in 0..10 {
        manager
            .admit(RoomTarget::Chat(ChannelId::new(7)), Some("alice"))
            .await
            .unwrap();
    }
    assert_eq!(
        manager
            .admit(RoomTarget::Chat(ChannelId::new(7)), Some("alice"))
            .await,
        Err(close_codes::RATE_LIMITED)
    );
    // Admission never touched the registry.
    assert_eq!(manager.registry().active_count().await, 0);
}
