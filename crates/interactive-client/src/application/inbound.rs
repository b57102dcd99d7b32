//! Routing of inbound text frames.
//!
//! The reader task owns the socket's read half and hands every text frame to
//! an [`InboundHandler`].  The client's handler calls [`route_frame`], which
//! is the only place inbound frames are decoded:
//!
//! - replies resolve pending calls in the [`Correlator`];
//! - server methods are decoded into [`ServerEvent`]s, mirrored into the
//!   [`ResourceCache`] and then queued on the [`Dispatcher`];
//! - `discard` frames are skipped;
//! - anything malformed is logged and dropped.  One bad frame never stops
//!   the reader.

use interactive_core::{decode_packet, Packet, ProtocolError, ServerEvent};
use tracing::{debug, warn};

use crate::application::cache::ResourceCache;
use crate::application::correlator::Correlator;
use crate::application::dispatcher::Dispatcher;

/// Callbacks from the transport's reader and writer tasks.
pub trait InboundHandler: Send + Sync + 'static {
    /// One text frame arrived.  Must not block.
    fn on_text(&self, text: &str);

    /// The transport is gone.  May be called more than once.
    fn on_closed(&self, reason: &str);
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A reply; `matched` is false for unknown or duplicate ids.
    Reply { id: u32, matched: bool },
    /// A server push queued to `delivered` observers.
    Event { method: String, delivered: usize },
    /// A push flagged `discard`.
    Discarded { method: String },
    /// The frame could not be understood.
    Dropped(ProtocolError),
}

/// Decodes one frame and routes it.
pub fn route_frame(
    text: &str,
    correlator: &Correlator,
    cache: &ResourceCache,
    dispatcher: &Dispatcher,
) -> FrameOutcome {
    let packet = match decode_packet(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("dropping undecodable frame: {e}");
            return FrameOutcome::Dropped(e);
        }
    };

    match packet {
        Packet::Reply(reply) => {
            let id = reply.id;
            let matched = correlator.resolve(reply);
            FrameOutcome::Reply { id, matched }
        }
        Packet::Method(push) | Packet::Event(push) => {
            if push.discard {
                debug!(method = %push.method, "discard frame skipped");
                return FrameOutcome::Discarded {
                    method: push.method,
                };
            }
            let event = match ServerEvent::decode(&push.method, push.params) {
                Ok(event) => event,
                Err(e) => {
                    warn!("dropping server push: {e}");
                    return FrameOutcome::Dropped(e);
                }
            };
            debug!(method = event.method(), "server push");
            cache.apply_event(&event);
            let delivered = dispatcher.dispatch(&event);
            FrameOutcome::Event {
                method: event.method().to_string(),
                delivered,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interactive_core::protocol::{encode_push, encode_reply, ReplyPacket};
    use interactive_core::Scene;
    use serde_json::json;

    struct Fixture {
        correlator: Correlator,
        cache: ResourceCache,
        dispatcher: Dispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                correlator: Correlator::new(),
                cache: ResourceCache::new(),
                dispatcher: Dispatcher::new(),
            }
        }

        fn route(&self, text: &str) -> FrameOutcome {
            route_frame(text, &self.correlator, &self.cache, &self.dispatcher)
        }
    }

    #[test]
    fn test_reply_resolves_pending_call() {
        let fx = Fixture::new();
        let (id, mut slot) = fx.correlator.register("getTime").unwrap();

        let outcome = fx.route(&encode_reply(&ReplyPacket::success(id, json!({"time": 1}))).unwrap());

        assert_eq!(outcome, FrameOutcome::Reply { id, matched: true });
        assert_eq!(slot.try_recv().unwrap(), Ok(json!({"time": 1})));
    }

    #[test]
    fn test_unknown_reply_id_leaves_pending_calls_alone() {
        let fx = Fixture::new();
        let (_id, _slot) = fx.correlator.register("getTime").unwrap();

        let outcome = fx.route(r#"{"type":"reply","id":999,"result":{}}"#);

        assert_eq!(outcome, FrameOutcome::Reply { id: 999, matched: false });
        assert_eq!(fx.correlator.pending_count(), 1);
    }

    #[test]
    fn test_push_updates_cache_before_observers_see_it() {
        // Arrange
        let fx = Fixture::new();
        let mut stream = fx.dispatcher.subscribe("onSceneCreate");
        let frame = encode_push("onSceneCreate", json!({"scenes": [{"sceneID": "s9"}]})).unwrap();

        // Act
        let outcome = fx.route(&frame);

        // Assert
        assert_eq!(
            outcome,
            FrameOutcome::Event {
                method: "onSceneCreate".into(),
                delivered: 1
            }
        );
        assert!(fx.cache.has_scene("s9"));
        assert_eq!(
            stream.try_recv(),
            Some(ServerEvent::SceneCreate(vec![Scene::new("s9")]))
        );
    }

    #[test]
    fn test_discard_frames_are_skipped() {
        let fx = Fixture::new();
        let mut all = fx.dispatcher.subscribe("*");

        let outcome = fx.route(
            r#"{"type":"method","method":"onSceneCreate","params":{"scenes":[{"sceneID":"x"}]},"discard":true}"#,
        );

        assert!(matches!(outcome, FrameOutcome::Discarded { .. }));
        assert!(!fx.cache.has_scene("x"));
        assert_eq!(all.try_recv(), None);
    }

    #[test]
    fn test_garbage_frames_are_dropped() {
        let fx = Fixture::new();

        for frame in ["", "{", "[]", r#"{"type":"nope"}"#, r#"{"type":"reply"}"#] {
            assert!(matches!(fx.route(frame), FrameOutcome::Dropped(_)), "frame {frame:?}");
        }
    }

    #[test]
    fn test_malformed_params_are_dropped() {
        let fx = Fixture::new();
        let outcome = fx.route(r#"{"type":"method","method":"onReady","params":{"isReady":"yes"}}"#);
        assert!(matches!(
            outcome,
            FrameOutcome::Dropped(ProtocolError::MalformedParams { .. })
        ));
    }

    #[test]
    fn test_dropped_outcome_can_be_cloned_and_compared() {
        // Arrange
        let fx = Fixture::new();
        let outcome = fx.route("{");

        // Act
        let copy = outcome.clone();

        // Assert
        assert_eq!(copy, outcome);
        assert!(matches!(copy, FrameOutcome::Dropped(ProtocolError::MalformedFrame(_))));
    }
}
