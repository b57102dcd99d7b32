//! Event dispatch: fanning server pushes out to registered observers.
//!
//! Observers register under a method name (`"giveInput"`,
//! `"onParticipantJoin"`, ...) or under [`WILDCARD`] to see everything.  Each
//! registration owns an unbounded queue.  [`Dispatcher::dispatch`] only pushes
//! onto those queues, so a slow observer can never stall the reader task that
//! calls it, and every observer sees its events in wire order.
//!
//! Two observer shapes share the same queues:
//!
//! - [`EventStream`]: pull-based, the host awaits [`EventStream::recv`].
//! - [`EventObserver`]: push-based, a worker task calls
//!   [`EventObserver::on_event`] for each queued event in turn.
//!
//! A registration whose receiving side is gone (stream dropped, worker
//! finished) is pruned the next time an event for its key is dispatched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use interactive_core::ServerEvent;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::application::lock;

/// Registration key that receives every event.
pub const WILDCARD: &str = "*";

/// Push-based observer driven by its own worker task.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventObserver: Send + Sync {
    /// Handles one event.  Events for this observer arrive one at a time in
    /// wire order; the next is not delivered until this returns.
    async fn on_event(&self, event: ServerEvent);
}

/// Pull-based view of one registration's queue.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl EventStream {
    /// Waits for the next event.  Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    /// Returns an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }
}

/// Registry of observer queues keyed by method name.
#[derive(Debug, Default)]
pub struct Dispatcher {
    queues: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<ServerEvent>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pull-based observer for `method` (or [`WILDCARD`]).
    pub fn subscribe(&self, method: &str) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.queues)
            .entry(method.to_string())
            .or_default()
            .push(tx);
        debug!(method, "event stream registered");
        EventStream { rx }
    }

    /// Registers a push-based observer and spawns its worker task.
    ///
    /// Must be called from inside a Tokio runtime.  Abort the returned handle
    /// to unregister; the queue is pruned on the next matching dispatch.
    pub fn observe(&self, method: &str, observer: Arc<dyn EventObserver>) -> JoinHandle<()> {
        let mut stream = self.subscribe(method);
        let key = method.to_string();
        tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                observer.on_event(event).await;
            }
            debug!(method = %key, "observer worker finished");
        })
    }

    /// Queues `event` for every observer of its method and every wildcard
    /// observer.  Never awaits.  Returns how many queues received it.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let mut queues = lock(&self.queues);
        let mut delivered = 0;
        for key in [event.method(), WILDCARD] {
            let Some(senders) = queues.get_mut(key) else {
                continue;
            };
            senders.retain(|tx| match tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!(method = key, "pruning closed observer queue");
                    false
                }
            });
            if senders.is_empty() {
                queues.remove(key);
            }
        }
        trace!(method = event.method(), delivered, "event dispatched");
        delivered
    }

    /// Number of live-or-not-yet-pruned registrations for `method`.
    pub fn observer_count(&self, method: &str) -> usize {
        lock(&self.queues).get(method).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn other(method: &str, n: i64) -> ServerEvent {
        ServerEvent::Other {
            method: method.to_string(),
            params: json!({"n": n}),
        }
    }

    #[test]
    fn test_subscribers_see_only_their_method() {
        // Arrange
        let dispatcher = Dispatcher::new();
        let mut ready = dispatcher.subscribe("onReady");
        let mut input = dispatcher.subscribe("giveInput");

        // Act
        let delivered = dispatcher.dispatch(&ServerEvent::Ready(true));

        // Assert
        assert_eq!(delivered, 1);
        assert_eq!(ready.try_recv(), Some(ServerEvent::Ready(true)));
        assert_eq!(input.try_recv(), None);
    }

    #[test]
    fn test_wildcard_sees_every_event() {
        let dispatcher = Dispatcher::new();
        let mut all = dispatcher.subscribe(WILDCARD);

        dispatcher.dispatch(&ServerEvent::Hello);
        dispatcher.dispatch(&other("custom", 1));

        assert_eq!(all.try_recv(), Some(ServerEvent::Hello));
        assert_eq!(all.try_recv().map(|e| e.method().to_string()), Some("custom".into()));
    }

    #[test]
    fn test_per_observer_order_is_wire_order() {
        let dispatcher = Dispatcher::new();
        let mut stream = dispatcher.subscribe("tick");

        for n in 0..100 {
            dispatcher.dispatch(&other("tick", n));
        }

        for n in 0..100 {
            assert_eq!(stream.try_recv(), Some(other("tick", n)));
        }
    }

    #[test]
    fn test_dropped_stream_is_pruned() {
        let dispatcher = Dispatcher::new();
        let stream = dispatcher.subscribe("onReady");
        let mut kept = dispatcher.subscribe("onReady");
        drop(stream);

        let delivered = dispatcher.dispatch(&ServerEvent::Ready(false));

        assert_eq!(delivered, 1);
        assert_eq!(dispatcher.observer_count("onReady"), 1);
        assert!(kept.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_observer_worker_receives_events_in_order() {
        // Arrange
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let mut observer = MockEventObserver::new();
        observer.expect_on_event().times(3).returning(move |event| {
            seen_tx.send(event).unwrap();
        });
        let dispatcher = Dispatcher::new();
        let worker = dispatcher.observe("tick", Arc::new(observer));

        // Act
        for n in 0..3 {
            dispatcher.dispatch(&other("tick", n));
        }

        // Assert
        for n in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
                .await
                .unwrap();
            assert_eq!(event, Some(other("tick", n)));
        }
        worker.abort();
    }

    #[tokio::test]
    async fn test_slow_observer_does_not_block_dispatch() {
        // Arrange: an observer that never finishes its first event
        struct Stuck;
        #[async_trait]
        impl EventObserver for Stuck {
            async fn on_event(&self, _event: ServerEvent) {
                std::future::pending::<()>().await;
            }
        }
        let dispatcher = Dispatcher::new();
        let worker = dispatcher.observe(WILDCARD, Arc::new(Stuck));
        let mut fast = dispatcher.subscribe(WILDCARD);

        // Act: dispatch is synchronous, so this returning at all is the point
        for n in 0..1000 {
            dispatcher.dispatch(&other("flood", n));
        }

        // Assert
        assert_eq!(fast.try_recv(), Some(other("flood", 0)));
        worker.abort();
    }
}
