//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the gateway and the outside world. Adapters implement these ports.
//!
//! The gateway deliberately implements none of the platform's CRUD: chat
//! persistence, authorization, notification, presence storage, and the
//! pub/sub broker are all reached through these narrow interfaces.

mod chat_store;
mod event_bus;
mod meeting_store;
mod notifier;
mod presence_store;
mod room_authorizer;
mod token_verifier;

pub use chat_store::{ChatStore, SavedMessage, StoreError};
pub use event_bus::{BusError, RoomEventHandler, RoomEventPublisher, RoomEventSubscriber};
pub use meeting_store::{MeetingStore, ParticipantChange};
pub use notifier::Notifier;
pub use presence_store::{PresenceError, PresenceStore};
pub use room_authorizer::{AuthzError, RoomAuthorizer};
pub use token_verifier::{AuthClaims, TokenError, TokenVerifier};
