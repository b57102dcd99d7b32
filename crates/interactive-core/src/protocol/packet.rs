//! Packet envelope types for the interactive wire protocol.
//!
//! Every frame on the websocket is a single JSON object whose `"type"` field
//! selects the packet kind:
//!
//! ```json
//! {"type":"method","id":7,"method":"getScenes","params":{},"discard":false}
//! {"type":"reply","id":7,"result":{"scenes":[]},"error":null}
//! {"type":"method","method":"onParticipantJoin","params":{"participants":[]},"discard":false}
//! ```
//!
//! Method packets sent by the client carry an `id` that the server echoes in
//! the matching reply.  Method (or event) packets pushed by the server carry
//! no id the client needs to correlate.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Protocol version advertised in the `X-Protocol-Version` handshake header.
pub const PROTOCOL_VERSION: &str = "2.0";

/// The first packet id a fresh connection hands out.
pub const FIRST_PACKET_ID: u32 = 0;

/// Error codes the service puts in the `code` field of a reply error.
pub mod error_codes {
    /// The frame could not be parsed.
    pub const INVALID_PAYLOAD: u32 = 4000;
    /// The `type` discriminator was not recognised.
    pub const UNKNOWN_PACKET_TYPE: u32 = 4002;
    /// The method name is not known to the service.
    pub const UNKNOWN_METHOD: u32 = 4003;
    /// The method arguments failed to parse or validate.
    pub const INVALID_PARAMS: u32 = 4004;
    /// The transaction id passed to `capture` is unknown or already captured.
    pub const INVALID_TRANSACTION: u32 = 4005;
    /// A referenced scene does not exist.
    pub const UNKNOWN_SCENE: u32 = 4007;
    /// A referenced group does not exist.
    pub const UNKNOWN_GROUP: u32 = 4008;
    /// A referenced control does not exist.
    pub const UNKNOWN_CONTROL: u32 = 4009;
    /// A referenced participant does not exist.
    pub const UNKNOWN_PARTICIPANT: u32 = 4010;
    /// A create call used an id that already exists.
    pub const ALREADY_EXISTS: u32 = 4011;
    /// The reserved `default` scene or group cannot be deleted.
    pub const RESERVED_RESOURCE: u32 = 4012;
    /// The operation needs the client to be ready first.
    pub const NOT_READY: u32 = 4013;
    /// The caller exceeded the server-side throttle for this method.
    pub const RATE_LIMITED: u32 = 4429;
}

// ── Packet kind ───────────────────────────────────────────────────────────────

/// The `type` discriminator of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketType {
    Method,
    Reply,
    Event,
}

impl PacketType {
    /// The discriminator string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Method => "method",
            PacketType::Reply => "reply",
            PacketType::Event => "event",
        }
    }
}

impl TryFrom<&str> for PacketType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "method" => Ok(PacketType::Method),
            "reply" => Ok(PacketType::Reply),
            "event" => Ok(PacketType::Event),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Packet bodies ─────────────────────────────────────────────────────────────

/// A method call, in either direction.
///
/// Client-issued calls always have `id = Some(..)`.  Server pushes may omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodPacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
    /// Set by the server on pushes the client may ignore (duplicate or superseded).
    #[serde(default)]
    pub discard: bool,
}

impl MethodPacket {
    /// Builds a client-issued call.
    pub fn call(id: u32, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id),
            method: method.into(),
            params,
            discard: false,
        }
    }

    /// Builds a server push with no correlation id.
    pub fn push(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
            discard: false,
        }
    }
}

/// The server's answer to a client-issued method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPacket {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl ReplyPacket {
    /// A successful reply.
    pub fn success(id: u32, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A failed reply.
    pub fn failure(id: u32, error: ReplyError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Splits the reply into the call outcome.
    ///
    /// An `error` field wins over `result`; a reply with neither resolves to
    /// `Value::Null`.
    pub fn into_outcome(self) -> Result<Value, ReplyError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Application-level error reported by the server in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("server error {code}: {message}")]
pub struct ReplyError {
    pub code: u32,
    pub message: String,
    /// Dotted path of the offending argument, when the server knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ReplyError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Attaches the argument path to the error.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// `true` when the server rejected the call for exceeding its throttle.
    pub fn is_rate_limited(&self) -> bool {
        self.code == error_codes::RATE_LIMITED
    }
}

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Method(MethodPacket),
    Reply(ReplyPacket),
    Event(MethodPacket),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Method(_) => PacketType::Method,
            Packet::Reply(_) => PacketType::Reply,
            Packet::Event(_) => PacketType::Event,
        }
    }
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_packet_type_round_trips_through_str() {
        for kind in [PacketType::Method, PacketType::Reply, PacketType::Event] {
            assert_eq!(PacketType::try_from(kind.as_str()), Ok(kind));
        }
        assert_eq!(PacketType::try_from("invoke"), Err(()));
    }

    #[test]
    fn test_reply_outcome_prefers_error() {
        // Arrange
        let reply = ReplyPacket {
            id: 3,
            result: Some(json!({"ok": true})),
            error: Some(ReplyError::new(4007, "unknown scene")),
        };

        // Act
        let outcome = reply.into_outcome();

        // Assert
        assert_eq!(outcome.unwrap_err().code, 4007);
    }

    #[test]
    fn test_reply_outcome_without_result_is_null() {
        let reply = ReplyPacket {
            id: 1,
            result: None,
            error: None,
        };
        assert_eq!(reply.into_outcome(), Ok(Value::Null));
    }

    #[test]
    fn test_reply_error_display_includes_code_and_message() {
        let err = ReplyError::new(4004, "bad params").at("scenes[0].sceneID");
        assert_eq!(err.to_string(), "server error 4004: bad params");
        assert_eq!(err.path.as_deref(), Some("scenes[0].sceneID"));
    }

    #[test]
    fn test_rate_limited_code_is_detected() {
        assert!(ReplyError::new(error_codes::RATE_LIMITED, "slow down").is_rate_limited());
        assert!(!ReplyError::new(error_codes::UNKNOWN_SCENE, "nope").is_rate_limited());
    }

    #[test]
    fn test_method_packet_defaults_params_to_empty_object() {
        let packet: MethodPacket = serde_json::from_str(r#"{"method":"hello"}"#).unwrap();
        assert_eq!(packet.params, json!({}));
        assert!(!packet.discard);
        assert_eq!(packet.id, None);
    }
}
