//! The dispatch loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::correlation::ReplyTable;
use crate::event::{GatewayUpdate, InboundEvent, InteractionReply};
use crate::gateway::ChatGateway;
use crate::registry::HandlerRegistry;

/// What happened to one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A registered handler accepted the message.
    Handled,
    /// A pending continuation consumed the button tap.
    Continued,
    /// Nothing matched; the update was dropped after logging.
    Unmatched,
}

/// Routes gateway updates to handlers and continuations.
///
/// The loop waits for an update, processes it, and goes back to waiting.
/// Exactly one handler or continuation runs per update, on the loop itself,
/// so handlers hand long work to spawned tasks.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    replies: Arc<ReplyTable>,
    gateway: Arc<dyn ChatGateway>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        replies: Arc<ReplyTable>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            registry,
            replies,
            gateway,
        }
    }

    /// Processes updates until the gateway side of the channel closes.
    pub async fn run(&self, mut updates: mpsc::Receiver<GatewayUpdate>) {
        info!(handlers = self.registry.len(), "dispatch loop started");
        while let Some(update) = updates.recv().await {
            self.process(update).await;
        }
        info!("update stream ended, dispatch loop stopped");
    }

    /// Processes a single update.
    pub async fn process(&self, update: GatewayUpdate) -> Outcome {
        match update {
            GatewayUpdate::Message(event) => self.dispatch_message(event),
            GatewayUpdate::Interaction(reply) => self.dispatch_interaction(reply).await,
        }
    }

    fn dispatch_message(&self, event: InboundEvent) -> Outcome {
        let Some(route) = self.registry.resolve(&event) else {
            info!(
                chat_id = event.chat_id(),
                text = ?event.text,
                "no handler matched"
            );
            return Outcome::Unmatched;
        };

        debug!(chat_id = event.chat_id(), matcher = %route.matcher, "handler matched");
        let captures = route.matcher.captures(&event).unwrap_or_default();
        (route.handler)(event, captures);
        Outcome::Handled
    }

    async fn dispatch_interaction(&self, reply: InteractionReply) -> Outcome {
        // The continuation runs before the tap is acknowledged.
        let outcome = if self.replies.resolve(&reply.message, &reply.choice) {
            debug!(
                chat_id = reply.message.chat_id,
                message_id = reply.message.message_id,
                choice = %reply.choice,
                "continuation resumed"
            );
            Outcome::Continued
        } else {
            info!(
                chat_id = reply.message.chat_id,
                message_id = reply.message.message_id,
                "no pending interaction for button tap"
            );
            Outcome::Unmatched
        };

        if let Err(e) = self
            .gateway
            .acknowledge(&reply.interaction_id, &reply.choice)
            .await
        {
            warn!(interaction = %reply.interaction_id, error = %e, "failed to acknowledge button tap");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::event::MessageRef;
    use crate::gateway::OutgoingMessage;
    use crate::matcher::Matcher;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AckLog {
        acks: Mutex<Vec<String>>,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ChatGateway for AckLog {
        async fn send(&self, message: &OutgoingMessage) -> Result<MessageRef> {
            Ok(MessageRef::new(message.chat_id, 1))
        }

        async fn acknowledge(&self, interaction_id: &str, _value: &str) -> Result<()> {
            self.order.lock().unwrap().push("ack");
            self.acks.lock().unwrap().push(interaction_id.to_string());
            Ok(())
        }

        async fn send_typing(&self, _chat_id: i64) -> Result<()> {
            Ok(())
        }
    }

    fn dispatcher(registry: HandlerRegistry) -> (Dispatcher, Arc<ReplyTable>, Arc<AckLog>) {
        let replies = Arc::new(ReplyTable::new());
        let gateway = Arc::new(AckLog::default());
        let dispatcher = Dispatcher::new(Arc::new(registry), Arc::clone(&replies), gateway.clone());
        (dispatcher, replies, gateway)
    }

    fn tap(id: &str, message: MessageRef, choice: &str) -> GatewayUpdate {
        GatewayUpdate::Interaction(InteractionReply {
            interaction_id: id.to_string(),
            message,
            choice: choice.to_string(),
        })
    }

    #[tokio::test]
    async fn test_message_routed_with_captures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut registry = HandlerRegistry::new();
        registry.register(
            Matcher::command("/download_([0-9]+)").unwrap(),
            Arc::new(move |_event, caps| sink.lock().unwrap().extend(caps)),
        );
        let (dispatcher, _, _) = dispatcher(registry);

        let outcome = dispatcher
            .process(GatewayUpdate::Message(InboundEvent::command(
                MessageRef::new(1, 1),
                "/download_12",
            )))
            .await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(*seen.lock().unwrap(), vec!["12"]);
    }

    #[tokio::test]
    async fn test_unmatched_message_is_dropped() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            Matcher::command("/a").unwrap(),
            Arc::new(|_, _| panic!("must not run")),
        );
        registry.register(
            Matcher::command("/b").unwrap(),
            Arc::new(|_, _| panic!("must not run")),
        );
        let (dispatcher, _, gateway) = dispatcher(registry);

        let outcome = dispatcher
            .process(GatewayUpdate::Message(InboundEvent::text(MessageRef::new(1, 1), "hi")))
            .await;

        assert_eq!(outcome, Outcome::Unmatched);
        assert!(gateway.acks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_continuation_runs_before_ack() {
        let (dispatcher, replies, gateway) = dispatcher(HandlerRegistry::new());
        let order = Arc::clone(&gateway.order);
        let sent = MessageRef::new(1, 99);
        replies.register(sent, Box::new(move |_| order.lock().unwrap().push("continuation")));

        let outcome = dispatcher.process(tap("cb-1", sent, "Movies")).await;

        assert_eq!(outcome, Outcome::Continued);
        assert_eq!(*gateway.order.lock().unwrap(), vec!["continuation", "ack"]);
    }

    #[tokio::test]
    async fn test_unknown_tap_still_acknowledged() {
        let (dispatcher, _, gateway) = dispatcher(HandlerRegistry::new());

        let outcome = dispatcher.process(tap("cb-2", MessageRef::new(1, 5), "All")).await;

        assert_eq!(outcome, Outcome::Unmatched);
        assert_eq!(*gateway.acks.lock().unwrap(), vec!["cb-2"]);
    }

    #[tokio::test]
    async fn test_second_tap_does_not_rerun() {
        let (dispatcher, replies, _) = dispatcher(HandlerRegistry::new());
        let runs = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&runs);
        let sent = MessageRef::new(3, 8);
        replies.register(sent, Box::new(move |_| *counter.lock().unwrap() += 1));

        assert_eq!(dispatcher.process(tap("a", sent, "file")).await, Outcome::Continued);
        assert_eq!(dispatcher.process(tap("b", sent, "server")).await, Outcome::Unmatched);
        assert_eq!(*runs.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let (dispatcher, _, _) = dispatcher(HandlerRegistry::new());
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        dispatcher.run(rx).await;
    }
}
