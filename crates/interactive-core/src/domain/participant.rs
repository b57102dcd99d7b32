//! Participants (connected viewers) and the input they send.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::group::DEFAULT_GROUP_ID;
use crate::domain::scene::Meta;

/// A viewer connected to the interactive session.
///
/// Timestamps are Unix milliseconds as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "sessionID")]
    pub session_id: Uuid,
    #[serde(rename = "userID", default)]
    pub user_id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub level: u32,
    #[serde(rename = "groupID", default = "default_group_id")]
    pub group_id: String,
    #[serde(rename = "connectedAt", default)]
    pub connected_at: u64,
    #[serde(rename = "lastInputAt", default)]
    pub last_input_at: u64,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Participant {
    /// A participant in the default group, mostly useful for tests and fixtures.
    pub fn new(session_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            session_id,
            user_id: 0,
            username: username.into(),
            level: 0,
            group_id: default_group_id(),
            connected_at: 0,
            last_input_at: 0,
            disabled: false,
            meta: Meta::new(),
        }
    }
}

/// Payload of the server's `giveInput` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Session id of the participant who produced the input.
    #[serde(rename = "participantID")]
    pub participant_id: Uuid,
    /// Present when the input charges sparks; pass it to `capture` to collect.
    #[serde(
        rename = "transactionID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_id: Option<String>,
    pub input: ControlInput,
}

/// The control-specific part of an input event.
///
/// `event` is e.g. `"mousedown"`, `"mouseup"` or `"move"`; any other fields
/// (`x`, `y`, `value`, ...) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    #[serde(rename = "controlID")]
    pub control_id: String,
    pub event: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_participant_decodes_wire_names() {
        let id = Uuid::new_v4();
        let participant: Participant = serde_json::from_value(json!({
            "sessionID": id.to_string(),
            "userID": 42,
            "username": "viewer",
            "level": 7,
            "groupID": "vip",
            "connectedAt": 1000,
            "lastInputAt": 2000,
            "disabled": false
        }))
        .unwrap();

        assert_eq!(participant.session_id, id);
        assert_eq!(participant.group_id, "vip");
        assert_eq!(participant.connected_at, 1000);
        assert_eq!(participant.last_input_at, 2000);
    }

    #[test]
    fn test_participant_defaults_to_default_group() {
        let participant: Participant =
            serde_json::from_value(json!({"sessionID": Uuid::nil().to_string()})).unwrap();
        assert_eq!(participant.group_id, DEFAULT_GROUP_ID);
    }

    #[test]
    fn test_input_event_keeps_control_specific_fields() {
        let event: InputEvent = serde_json::from_value(json!({
            "participantID": Uuid::nil().to_string(),
            "transactionID": "tx-1",
            "input": {"controlID": "stick", "event": "move", "x": 0.5, "y": -0.25}
        }))
        .unwrap();

        assert_eq!(event.transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(event.input.control_id, "stick");
        assert_eq!(event.input.extra["x"], json!(0.5));
        assert_eq!(event.input.extra["y"], json!(-0.25));
    }
}
