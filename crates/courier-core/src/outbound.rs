//! Serialized outbound delivery.
//!
//! Handlers never talk to the gateway directly. They push [`OutboundRequest`]s
//! into an [`Outbox`]; a single [`OutboundSender`] drains the queue, so
//! requests leave in the order they were enqueued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::correlation::{Continuation, ReplyTable};
use crate::error::{CoreError, Result};
use crate::event::MessageRef;
use crate::gateway::{ChatGateway, ChoiceSet, Document, OutgoingMessage};

/// Maximum characters delivered per message; the rest is dropped.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Delivery attempts per request.
pub const SEND_ATTEMPTS: usize = 3;

/// Default pause between failed attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A reply waiting to be delivered.
pub struct OutboundRequest {
    /// Message being answered; decides the target chat.
    pub reply_to: MessageRef,
    pub text: String,
    /// Render as HTML.
    pub rich: bool,
    pub choices: Option<ChoiceSet>,
    pub document: Option<Document>,
    /// Runs with the chosen value once the user taps a button.
    pub continuation: Option<Continuation>,
}

impl OutboundRequest {
    /// A plain text reply.
    pub fn text(reply_to: MessageRef, text: impl Into<String>) -> Self {
        Self {
            reply_to,
            text: text.into(),
            rich: false,
            choices: None,
            document: None,
            continuation: None,
        }
    }

    /// An HTML reply.
    pub fn html(reply_to: MessageRef, text: impl Into<String>) -> Self {
        Self {
            rich: true,
            ..Self::text(reply_to, text)
        }
    }

    /// A reply offering `choices`; `continuation` receives the tapped value.
    pub fn ask(
        reply_to: MessageRef,
        text: impl Into<String>,
        choices: ChoiceSet,
        continuation: impl FnOnce(String) + Send + 'static,
    ) -> Self {
        Self {
            choices: Some(choices),
            continuation: Some(Box::new(continuation)),
            ..Self::text(reply_to, text)
        }
    }

    /// A document reply with `caption`.
    pub fn document(reply_to: MessageRef, caption: impl Into<String>, document: Document) -> Self {
        Self {
            document: Some(document),
            ..Self::text(reply_to, caption)
        }
    }
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("reply_to", &self.reply_to)
            .field("text_len", &self.text.chars().count())
            .field("rich", &self.rich)
            .field("choices", &self.choices.is_some())
            .field("document", &self.document.as_ref().map(|d| &d.file_name))
            .field("continuation", &self.continuation.is_some())
            .finish()
    }
}

/// Producer handle for the outbound queue. Cheap to clone.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<OutboundRequest>,
}

impl Outbox {
    /// Enqueues a request, waiting for room if the queue is full.
    pub async fn send(&self, request: OutboundRequest) -> Result<()> {
        self.tx.send(request).await.map_err(|_| CoreError::QueueClosed)
    }

    /// Enqueues a plain text reply.
    pub async fn reply(&self, reply_to: MessageRef, text: impl Into<String>) -> Result<()> {
        self.send(OutboundRequest::text(reply_to, text)).await
    }
}

/// Creates an outbound queue with room for `capacity` pending requests.
pub fn outbound_queue(capacity: usize) -> (Outbox, mpsc::Receiver<OutboundRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Outbox { tx }, rx)
}

/// Cuts `text` to at most `max` characters.
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The single consumer of the outbound queue.
pub struct OutboundSender {
    gateway: Arc<dyn ChatGateway>,
    replies: Arc<ReplyTable>,
    retry_delay: Duration,
}

impl OutboundSender {
    pub fn new(gateway: Arc<dyn ChatGateway>, replies: Arc<ReplyTable>) -> Self {
        Self {
            gateway,
            replies,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Overrides the pause between failed attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Drains the queue until every [`Outbox`] is dropped.
    pub async fn run(self, mut queue: mpsc::Receiver<OutboundRequest>) {
        info!("outbound sender started");
        while let Some(request) = queue.recv().await {
            self.deliver(request).await;
        }
        info!("outbound queue closed, sender stopped");
    }

    /// Delivers one request. Returns false when every attempt failed.
    pub async fn deliver(&self, request: OutboundRequest) -> bool {
        let OutboundRequest {
            reply_to,
            text,
            rich,
            choices,
            document,
            mut continuation,
        } = request;

        let original_len = text.chars().count();
        let message = OutgoingMessage {
            chat_id: reply_to.chat_id,
            reply_to: Some(reply_to.message_id),
            text: truncate(&text, MAX_MESSAGE_LEN).to_string(),
            rich,
            choices,
            document,
        };
        if original_len > MAX_MESSAGE_LEN {
            debug!(
                chat_id = reply_to.chat_id,
                original_len, "truncated outbound text"
            );
        }

        for attempt in 1..=SEND_ATTEMPTS {
            match self.gateway.send(&message).await {
                Ok(sent) => {
                    if let Some(continuation) = continuation.take() {
                        self.replies.register(sent, continuation);
                    }
                    return true;
                }
                Err(e) => {
                    warn!(
                        chat_id = reply_to.chat_id,
                        attempt,
                        error = %e,
                        "failed to send message"
                    );
                    if attempt < SEND_ATTEMPTS {
                        sleep(self.retry_delay).await;
                    }
                }
            }
        }

        warn!(
            chat_id = reply_to.chat_id,
            attempts = SEND_ATTEMPTS,
            "giving up on outbound message"
        );
        false
    }
}
