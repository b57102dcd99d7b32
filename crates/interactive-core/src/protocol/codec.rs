//! JSON codec for interactive protocol envelopes.
//!
//! Encoding produces a single text frame per packet.  Decoding inspects the
//! `type` discriminator first and then pulls out only the fields that kind of
//! packet needs, so a frame with extra fields still decodes while a frame with
//! a missing required field or an unknown discriminator is rejected with a
//! [`ProtocolError`].  Callers on the receive path log and drop those errors;
//! nothing here panics on hostile input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::packet::{MethodPacket, Packet, PacketType, ReplyError, ReplyPacket};

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame is not a JSON object we can read.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The `type` discriminator is absent or not one we understand.
    #[error("unknown packet type: {0:?}")]
    UnknownPacketType(String),

    /// A field required for this packet kind is absent.
    #[error("{packet} packet is missing required field `{field}`")]
    MissingField {
        packet: PacketType,
        field: &'static str,
    },

    /// The parameters of a known server method did not match its schema.
    #[error("malformed params for `{method}`: {reason}")]
    MalformedParams { method: String, reason: String },

    /// The packet could not be serialized.
    #[error("failed to encode packet: {0}")]
    Encode(String),

    /// The per-connection packet id space has been used up.
    #[error("packet id space exhausted for this connection")]
    IdSpaceExhausted,
}

// ── Encoding ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OutgoingEnvelope<'a> {
    #[serde(rename = "type")]
    kind: PacketType,
    #[serde(flatten)]
    body: OutgoingBody<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutgoingBody<'a> {
    Method(&'a MethodPacket),
    Reply(&'a ReplyPacket),
}

/// Encodes any [`Packet`] to its text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_packet(packet: &Packet) -> Result<String, ProtocolError> {
    let envelope = match packet {
        Packet::Method(m) => OutgoingEnvelope {
            kind: PacketType::Method,
            body: OutgoingBody::Method(m),
        },
        Packet::Event(m) => OutgoingEnvelope {
            kind: PacketType::Event,
            body: OutgoingBody::Method(m),
        },
        Packet::Reply(r) => OutgoingEnvelope {
            kind: PacketType::Reply,
            body: OutgoingBody::Reply(r),
        },
    };
    serde_json::to_string(&envelope).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Encodes a client-issued method call.
///
/// # Examples
///
/// ```rust
/// use interactive_core::protocol::{decode_packet, encode_method, Packet};
/// use serde_json::json;
///
/// let frame = encode_method(7, "getScenes", json!({})).unwrap();
/// match decode_packet(&frame).unwrap() {
///     Packet::Method(m) => assert_eq!(m.id, Some(7)),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn encode_method(id: u32, method: &str, params: Value) -> Result<String, ProtocolError> {
    encode_packet(&Packet::Method(MethodPacket::call(id, method, params)))
}

/// Encodes a reply frame (used by servers and test doubles).
pub fn encode_reply(reply: &ReplyPacket) -> Result<String, ProtocolError> {
    encode_packet(&Packet::Reply(reply.clone()))
}

/// Encodes a server push as a `method` packet without an id.
pub fn encode_push(method: &str, params: Value) -> Result<String, ProtocolError> {
    encode_packet(&Packet::Method(MethodPacket::push(method, params)))
}

// ── Decoding ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct IncomingEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    discard: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ReplyError>,
}

/// Decodes one text frame.
///
/// # Errors
///
/// - [`ProtocolError::MalformedFrame`] for invalid JSON or wrongly typed fields.
/// - [`ProtocolError::UnknownPacketType`] for a missing or unrecognised `type`.
/// - [`ProtocolError::MissingField`] when a reply lacks `id` or a method lacks `method`.
pub fn decode_packet(text: &str) -> Result<Packet, ProtocolError> {
    let envelope: IncomingEnvelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

    let raw_kind = envelope.kind.unwrap_or_default();
    let kind = PacketType::try_from(raw_kind.as_str())
        .map_err(|_| ProtocolError::UnknownPacketType(raw_kind.clone()))?;

    match kind {
        PacketType::Reply => {
            let id = envelope.id.ok_or(ProtocolError::MissingField {
                packet: kind,
                field: "id",
            })?;
            Ok(Packet::Reply(ReplyPacket {
                id,
                result: envelope.result,
                error: envelope.error,
            }))
        }
        PacketType::Method | PacketType::Event => {
            let method = envelope.method.ok_or(ProtocolError::MissingField {
                packet: kind,
                field: "method",
            })?;
            let body = MethodPacket {
                id: envelope.id,
                method,
                params: envelope
                    .params
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
                discard: envelope.discard,
            };
            Ok(if kind == PacketType::Event {
                Packet::Event(body)
            } else {
                Packet::Method(body)
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_method_writes_type_discriminator() {
        // Act
        let frame = encode_method(12, "createScenes", json!({"scenes": []})).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        // Assert
        assert_eq!(value["type"], "method");
        assert_eq!(value["id"], 12);
        assert_eq!(value["method"], "createScenes");
        assert_eq!(value["discard"], false);
        assert_eq!(value["params"], json!({"scenes": []}));
    }

    #[test]
    fn test_encode_push_omits_id() {
        let frame = encode_push("onReady", json!({"isReady": true})).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["type"], "method");
    }

    #[test]
    fn test_decode_reply_with_result() {
        let packet = decode_packet(r#"{"type":"reply","id":4,"result":{"time":99},"error":null}"#)
            .unwrap();
        assert_eq!(
            packet,
            Packet::Reply(ReplyPacket::success(4, json!({"time": 99})))
        );
    }

    #[test]
    fn test_decode_reply_with_error() {
        let packet = decode_packet(
            r#"{"type":"reply","id":5,"result":null,"error":{"code":4007,"message":"unknown scene","path":"sceneID"}}"#,
        )
        .unwrap();

        let Packet::Reply(reply) = packet else {
            panic!("expected reply");
        };
        let err = reply.into_outcome().unwrap_err();
        assert_eq!(err.code, 4007);
        assert_eq!(err.path.as_deref(), Some("sceneID"));
    }

    #[test]
    fn test_decode_event_discriminator_is_accepted() {
        let packet =
            decode_packet(r#"{"type":"event","method":"onReady","params":{"isReady":true}}"#)
                .unwrap();
        assert_eq!(packet.packet_type(), PacketType::Event);
    }

    #[test]
    fn test_decode_keeps_discard_flag() {
        let packet = decode_packet(
            r#"{"type":"method","method":"giveInput","params":{},"discard":true}"#,
        )
        .unwrap();
        let Packet::Method(m) = packet else {
            panic!("expected method");
        };
        assert!(m.discard);
    }

    #[test]
    fn test_decode_unknown_discriminator_is_protocol_error() {
        let err = decode_packet(r#"{"type":"invoke","method":"x"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownPacketType("invoke".to_string()));
    }

    #[test]
    fn test_decode_missing_discriminator_is_protocol_error() {
        let err = decode_packet(r#"{"id":1,"result":{}}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownPacketType(String::new()));
    }

    #[test]
    fn test_decode_reply_without_id_is_missing_field() {
        let err = decode_packet(r#"{"type":"reply","result":{}}"#).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingField {
                packet: PacketType::Reply,
                field: "id"
            }
        );
    }

    #[test]
    fn test_decode_method_without_name_is_missing_field() {
        let err = decode_packet(r#"{"type":"method","params":{}}"#).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingField { field: "method", .. }
        ));
    }

    #[test]
    fn test_decode_garbage_is_malformed_frame() {
        assert!(matches!(
            decode_packet("not json at all"),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            decode_packet(r#"{"type":"reply","id":"seven"}"#),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_decode_ignores_unknown_envelope_fields() {
        let packet =
            decode_packet(r#"{"type":"reply","id":9,"result":1,"seq":44,"compression":"none"}"#)
                .unwrap();
        assert_eq!(packet, Packet::Reply(ReplyPacket::success(9, json!(1))));
    }
}
