//! Routing of unsolicited gateway messages to subscribers.
//!
//! Replaces stringly-typed listener registration with channels: each
//! subscriber owns an `mpsc::Receiver`, registered either under one
//! event name or on the catch-all stream. Delivery is synchronous with
//! frame arrival and preserves socket order.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;

/// Capacity of each subscriber channel. A subscriber that falls this far
/// behind starts losing notifications (with a warning) rather than
/// blocking the socket loop.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;

/// An unsolicited message delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Event or method name as it appeared on the wire.
    pub name: String,

    /// Event parameters (`Value::Null` when the frame carried none).
    pub params: Value,
}

/// Fan-out registry for [`Notification`]s.
#[derive(Debug, Default)]
pub(crate) struct EventDispatcher {
    named: HashMap<String, Vec<mpsc::Sender<Notification>>>,
    all: Vec<mpsc::Sender<Notification>>,
}

impl EventDispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for one event name, or for every
    /// notification when `name` is `None`.
    pub(crate) fn subscribe(
        &mut self,
        name: Option<String>,
    ) -> mpsc::Receiver<Notification> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        match name {
            Some(name) => self.named.entry(name).or_default().push(tx),
            None => self.all.push(tx),
        }
        rx
    }

    /// Delivers one notification to the catch-all stream and to the
    /// subscribers registered under its name. Subscribers whose receiver
    /// is gone are pruned.
    pub(crate) fn dispatch(&mut self, note: Notification) {
        fan_out(&mut self.all, &note);
        if let Some(subs) = self.named.get_mut(&note.name) {
            fan_out(subs, &note);
            if subs.is_empty() {
                self.named.remove(&note.name);
            }
        }
    }
}

fn fan_out(subs: &mut Vec<mpsc::Sender<Notification>>, note: &Notification) {
    subs.retain(|tx| match tx.try_send(note.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(event = %note.name, "subscriber lagging, notification dropped");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn note(name: &str, n: u64) -> Notification {
        Notification {
            name: name.to_string(),
            params: json!({ "n": n }),
        }
    }

    #[tokio::test]
    async fn test_named_subscriber_receives_only_its_event() {
        let mut dispatcher = EventDispatcher::new();
        let mut rx = dispatcher.subscribe(Some("agent.status".into()));

        dispatcher.dispatch(note("agent.status", 1));
        dispatcher.dispatch(note("other.event", 2));

        let received = rx.try_recv().expect("should receive its event");
        assert_eq!(received.name, "agent.status");
        assert!(rx.try_recv().is_err(), "must not see other events");
    }

    #[tokio::test]
    async fn test_catch_all_receives_everything_in_order() {
        let mut dispatcher = EventDispatcher::new();
        let mut rx = dispatcher.subscribe(None);

        dispatcher.dispatch(note("a", 1));
        dispatcher.dispatch(note("b", 2));
        dispatcher.dispatch(note("a", 3));

        let names: Vec<String> = (0..3)
            .map(|_| rx.try_recv().expect("notification").name)
            .collect();
        assert_eq!(names, vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_named_and_catch_all_both_delivered() {
        let mut dispatcher = EventDispatcher::new();
        let mut named = dispatcher.subscribe(Some("tick".into()));
        let mut all = dispatcher.subscribe(None);

        dispatcher.dispatch(note("tick", 1));

        assert_eq!(named.try_recv().expect("named").params["n"], 1);
        assert_eq!(all.try_recv().expect("catch-all").params["n"], 1);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned() {
        let mut dispatcher = EventDispatcher::new();
        let rx = dispatcher.subscribe(Some("tick".into()));
        drop(rx);

        // Dispatch twice: the first prunes the dead sender, the second
        // must not panic or misroute.
        dispatcher.dispatch(note("tick", 1));
        dispatcher.dispatch(note("tick", 2));
        assert!(dispatcher.named.is_empty());
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_but_stays_registered() {
        let mut dispatcher = EventDispatcher::new();
        let mut rx = dispatcher.subscribe(Some("flood".into()));

        for i in 0..(SUBSCRIBER_CHANNEL_CAPACITY as u64 + 10) {
            dispatcher.dispatch(note("flood", i));
        }

        // The first CAPACITY notifications are buffered; the overflow is
        // dropped, not blocking, and the subscriber still works after
        // draining.
        let first = rx.try_recv().expect("buffered");
        assert_eq!(first.params["n"], 0);
        while rx.try_recv().is_ok() {}

        dispatcher.dispatch(note("flood", 999));
        assert_eq!(rx.try_recv().expect("after drain").params["n"], 999);
    }
}
