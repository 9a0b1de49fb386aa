//! Notifier that only logs.
//!
//! The real notification service lives outside this process; until the
//! deployment wires one in, saved messages are recorded at info level so
//! the fan-out can be traced end to end.

use async_trait::async_trait;

use crate::ports::{Notifier, SavedMessage};

#[derive(Default)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn message_saved(&self, message: &SavedMessage) {
        tracing::info!(
            message_id = %message.id,
            channel_id = %message.channel_id,
            sender_id = %message.sender_id,
            "message saved, notification handoff"
        );
    }
}
