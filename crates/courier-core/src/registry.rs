//! Ordered matcher-to-handler registry.

use std::sync::Arc;

use crate::event::InboundEvent;
use crate::matcher::Matcher;

/// A handler receives the event and the groups captured by its matcher.
///
/// Handlers run on the dispatch loop and must return quickly; anything that
/// blocks belongs in a spawned task.
pub type Handler = Arc<dyn Fn(InboundEvent, Vec<String>) + Send + Sync>;

/// A registry entry selected for an event.
pub struct Route<'a> {
    pub matcher: &'a Matcher,
    pub handler: &'a Handler,
}

/// Registry of (matcher, handler) pairs resolved by first match.
///
/// Resolution walks entries in registration order and stops at the first
/// matcher that accepts the event, so callers register the most specific
/// patterns first. The registry is filled at startup and then shared read-only.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use courier_core::{HandlerRegistry, InboundEvent, Matcher, MessageRef};
///
/// let mut registry = HandlerRegistry::new();
/// registry.register(Matcher::command("/version").unwrap(), Arc::new(|_event, _caps| {}));
///
/// let event = InboundEvent::command(MessageRef::new(1, 1), "/version");
/// assert!(registry.resolve(&event).is_some());
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<(Matcher, Handler)>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    ///
    /// An equal matcher already present keeps its position and gets the new handler.
    pub fn register(&mut self, matcher: Matcher, handler: Handler) {
        if let Some(entry) = self.entries.iter_mut().find(|(m, _)| *m == matcher) {
            entry.1 = handler;
            return;
        }
        self.entries.push((matcher, handler));
    }

    /// Finds the first entry whose matcher accepts the event.
    pub fn resolve(&self, event: &InboundEvent) -> Option<Route<'_>> {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(event))
            .map(|(matcher, handler)| Route { matcher, handler })
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matchers in resolution order.
    pub fn matchers(&self) -> impl Iterator<Item = &Matcher> {
        self.entries.iter().map(|(m, _)| m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MessageRef;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn origin() -> MessageRef {
        MessageRef::new(7, 1)
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Handler {
        let log = Arc::clone(log);
        Arc::new(move |_event, _caps| log.lock().unwrap().push(name))
    }

    #[test]
    fn test_find_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(Matcher::command("/test").unwrap(), recording(&log, "test"));

        let event = InboundEvent::command(origin(), "/test");
        let route = registry.resolve(&event).expect("handler for /test");
        (route.handler)(event.clone(), Vec::new());

        assert_eq!(*log.lock().unwrap(), vec!["test"]);
    }

    #[test]
    fn test_find_handler_in_multiple() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = |calls: &Arc<AtomicUsize>| -> Handler {
            let calls = Arc::clone(calls);
            Arc::new(move |_e, _c| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        let mut registry = HandlerRegistry::new();
        registry.register(Matcher::command("/test1").unwrap(), counter(&calls));
        registry.register(Matcher::command("/test2").unwrap(), counter(&calls));

        assert!(registry.resolve(&InboundEvent::command(origin(), "/test66")).is_none());
        assert!(registry.resolve(&InboundEvent::command(origin(), "/test2")).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_match_wins_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(Matcher::command("/[0-9]+").unwrap(), recording(&log, "topic"));
        registry.register(Matcher::command("/.*").unwrap(), recording(&log, "any"));

        for _ in 0..20 {
            let event = InboundEvent::command(origin(), "/1234");
            let route = registry.resolve(&event).unwrap();
            (route.handler)(event, Vec::new());
        }
        assert!(log.lock().unwrap().iter().all(|name| *name == "topic"));

        let event = InboundEvent::command(origin(), "/other");
        let route = registry.resolve(&event).unwrap();
        assert_eq!(route.matcher.to_string(), "command(/.*)");
    }

    #[test]
    fn test_register_same_matcher_replaces_in_place() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(Matcher::command("/a").unwrap(), recording(&log, "old"));
        registry.register(Matcher::free_text(".*").unwrap(), recording(&log, "text"));
        registry.register(Matcher::command("/a").unwrap(), recording(&log, "new"));

        assert_eq!(registry.len(), 2);
        let order: Vec<String> = registry.matchers().map(|m| m.to_string()).collect();
        assert_eq!(order, vec!["command(/a)", "text(.*)"]);

        let event = InboundEvent::command(origin(), "/a");
        (registry.resolve(&event).unwrap().handler)(event.clone(), Vec::new());
        assert_eq!(*log.lock().unwrap(), vec!["new"]);
    }
}
