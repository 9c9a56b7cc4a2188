//! Normalized inbound chat events.

/// Address of one chat message, used only to route replies back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// A file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    /// Original file name as uploaded.
    pub name: String,
    /// URL the file content can be fetched from.
    pub url: String,
}

/// One inbound chat message as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Message text, if any.
    pub text: Option<String>,
    /// Attached file, if any.
    pub file: Option<AttachedFile>,
    /// Whether the gateway flagged the message as an explicit bot command.
    pub is_command: bool,
    /// Originating message.
    pub origin: MessageRef,
}

impl InboundEvent {
    /// A plain text message.
    pub fn text(origin: MessageRef, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file: None,
            is_command: false,
            origin,
        }
    }

    /// A message flagged as a bot command.
    pub fn command(origin: MessageRef, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file: None,
            is_command: true,
            origin,
        }
    }

    /// A message carrying a file.
    pub fn file(origin: MessageRef, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: None,
            file: Some(AttachedFile {
                name: name.into(),
                url: url.into(),
            }),
            is_command: false,
            origin,
        }
    }

    /// Message text, or an empty string.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn chat_id(&self) -> i64 {
        self.origin.chat_id
    }
}

/// A user's tap on an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionReply {
    /// Gateway identifier used to acknowledge the tap.
    pub interaction_id: String,
    /// The interactive message the button belonged to.
    pub message: MessageRef,
    /// Value of the chosen button.
    pub choice: String,
}

/// Everything the gateway can deliver to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayUpdate {
    Message(InboundEvent),
    Interaction(InteractionReply),
}
