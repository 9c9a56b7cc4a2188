//! Reply-correlation table for interactive messages.
//!
//! Every message sent with inline buttons may leave a continuation behind. The
//! continuation is keyed by the identity the gateway assigned to the sent
//! message and runs at most once, when the user taps one of its buttons.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::event::MessageRef;

/// One-shot continuation receiving the chosen button value.
pub type Continuation = Box<dyn FnOnce(String) + Send>;

struct PendingInteraction {
    continuation: Continuation,
    registered_at: Instant,
}

/// Table of continuations awaiting a button tap.
///
/// All access goes through one mutex. The lock is never held while a
/// continuation runs, so a continuation may register new entries.
#[derive(Default)]
pub struct ReplyTable {
    pending: Mutex<HashMap<MessageRef, PendingInteraction>>,
}

impl ReplyTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MessageRef, PendingInteraction>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores a continuation for a sent message.
    ///
    /// Registering the same message twice replaces the earlier continuation.
    pub fn register(&self, message: MessageRef, continuation: Continuation) {
        let previous = self.lock().insert(
            message,
            PendingInteraction {
                continuation,
                registered_at: Instant::now(),
            },
        );
        if previous.is_some() {
            warn!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "replaced pending interaction"
            );
        } else {
            debug!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "registered pending interaction"
            );
        }
    }

    /// Consumes the continuation for `message` and runs it with `choice`.
    ///
    /// Returns false when nothing was pending for the message.
    pub fn resolve(&self, message: &MessageRef, choice: &str) -> bool {
        let entry = self.lock().remove(message);
        match entry {
            Some(pending) => {
                (pending.continuation)(choice.to_string());
                true
            }
            None => false,
        }
    }

    /// Drops entries registered more than `ttl` ago. Returns how many were dropped.
    pub fn sweep_older_than(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, p| now.duration_since(p.registered_at) < ttl);
        before - pending.len()
    }

    /// Number of interactions still waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
