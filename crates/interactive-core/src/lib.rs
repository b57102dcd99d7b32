//! # interactive-core
//!
//! Shared library for the interactive real-time protocol: the JSON packet
//! envelope and its codec, the per-connection packet id counter, typed server
//! events, and the resource models (scenes, groups, controls, participants,
//! throttle settings) together with the caller-side validation rules.
//!
//! This crate performs no I/O.  The `interactive-client` crate owns the
//! websocket, the pending-request table and the resource cache, and uses the
//! types defined here to speak the protocol.
//!
//! # Architecture overview
//!
//! An interactive session is a long-lived websocket between a game (this SDK)
//! and the service that renders controls to viewers.  Both sides send JSON
//! text frames:
//!
//! - **`protocol`**: the `{type, id, method, params}` / `{type, id, result,
//!   error}` envelope, the encoder/decoder, the id counter, method names and
//!   their parameter shapes, and [`ServerEvent`] for server pushes.
//!
//! - **`domain`**: the resources both sides talk about.  The service owns
//!   them; the client only mirrors what the service reports.

pub mod domain;
pub mod protocol;

pub use domain::{
    Control, ControlKind, Group, InputEvent, Participant, Scene, ThrottleSetting, ThrottleState,
    ValidationError, DEFAULT_GROUP_ID, DEFAULT_SCENE_ID,
};
pub use protocol::codec::{decode_packet, encode_method, ProtocolError};
pub use protocol::events::ServerEvent;
pub use protocol::packet::{Packet, ReplyError, PROTOCOL_VERSION};
pub use protocol::sequence::PacketIdCounter;
