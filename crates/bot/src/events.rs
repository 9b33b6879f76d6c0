use homestash_core::domain::item::{MediaRef, OwnerId};

use crate::commands::BotCommand;
use crate::replies::OutboundMessage;

/// One inbound update from the chat transport, tagged with the owner whose
/// session it belongs to. `update_id` doubles as the correlation id for the
/// whole turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub update_id: String,
    pub owner_id: OwnerId,
    pub event: ChatEvent,
}

/// The payload kinds the engine routes on. Attachment refs are the
/// transport's own file handles; the engine passes them through the media
/// layer before stashing them in a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Command(BotCommand),
    Text(String),
    Photo(MediaRef),
    Voice(MediaRef),
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Text(_) => "text",
            Self::Photo(_) => "photo",
            Self::Voice(_) => "voice",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Outcome of one engine turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<OutboundMessage>),
    Ignored,
}
