//! Chat gateway boundary.
//!
//! The gateway is the only component that talks to the chat transport. The
//! dispatch engine sees it through [`ChatGateway`]; inbound traffic arrives as
//! [`GatewayUpdate`](crate::event::GatewayUpdate) values on a channel fed by the
//! transport's listener.

use async_trait::async_trait;

use crate::error::Result;
use crate::event::MessageRef;

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Text shown on the button.
    pub label: String,
    /// Value delivered back when the button is tapped.
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A fixed grid of inline buttons, row by row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChoiceSet {
    pub rows: Vec<Vec<Choice>>,
}

impl ChoiceSet {
    pub fn new(rows: Vec<Vec<Choice>>) -> Self {
        Self { rows }
    }

    /// Returns true if `value` belongs to one of the buttons.
    pub fn contains(&self, value: &str) -> bool {
        self.rows.iter().flatten().any(|c| c.value == value)
    }
}

/// A file to deliver as a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A fully prepared message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    /// Message this one replies to.
    pub reply_to: Option<i32>,
    pub text: String,
    /// Render `text` as HTML markup.
    pub rich: bool,
    pub choices: Option<ChoiceSet>,
    /// When set, the message is sent as a document with `text` as caption.
    pub document: Option<Document>,
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Sends a message and returns the identity the transport assigned to it.
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageRef>;

    /// Acknowledges an inline button tap.
    async fn acknowledge(&self, interaction_id: &str, value: &str) -> Result<()>;

    /// Shows a typing indicator in the chat.
    async fn send_typing(&self, chat_id: i64) -> Result<()>;
}
