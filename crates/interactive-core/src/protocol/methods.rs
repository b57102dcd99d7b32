//! Method names and parameter/result shapes for the interactive protocol.
//!
//! Each struct here is exactly what goes into a packet's `params` (or comes
//! back in a reply's `result`).  Field names follow the wire, which mixes
//! `camelCase` and upper-case `ID` suffixes, so most fields carry an explicit
//! `rename`.

use serde::{Deserialize, Serialize};

use crate::domain::{Control, Group, Participant, Scene};

// ── Client → server methods ───────────────────────────────────────────────────

pub const READY: &str = "ready";
pub const GET_TIME: &str = "getTime";
pub const CAPTURE: &str = "capture";

pub const GET_SCENES: &str = "getScenes";
pub const CREATE_SCENES: &str = "createScenes";
pub const UPDATE_SCENES: &str = "updateScenes";
pub const DELETE_SCENE: &str = "deleteScene";

pub const GET_GROUPS: &str = "getGroups";
pub const CREATE_GROUPS: &str = "createGroups";
pub const UPDATE_GROUPS: &str = "updateGroups";
pub const DELETE_GROUP: &str = "deleteGroup";

pub const CREATE_CONTROLS: &str = "createControls";
pub const UPDATE_CONTROLS: &str = "updateControls";
pub const DELETE_CONTROLS: &str = "deleteControls";

pub const GET_ALL_PARTICIPANTS: &str = "getAllParticipants";
pub const GET_ACTIVE_PARTICIPANTS: &str = "getActiveParticipants";
pub const UPDATE_PARTICIPANTS: &str = "updateParticipants";

pub const SET_BANDWIDTH_THROTTLE: &str = "setBandwidthThrottle";
pub const GET_THROTTLE_STATE: &str = "getThrottleState";

// ── Shapes ────────────────────────────────────────────────────────────────────

/// Params of `ready` and of the `onReady` push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyParams {
    #[serde(rename = "isReady")]
    pub is_ready: bool,
}

/// `{scenes: [...]}`: params of create/update, result of get/create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenesParams {
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

/// Params of `deleteScene` and of the `onSceneDelete` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSceneParams {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(rename = "reassignSceneID")]
    pub reassign_scene_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupsParams {
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteGroupParams {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "reassignGroupID")]
    pub reassign_group_id: String,
}

/// Controls of one scene: params of create/update, and the matching pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlsParams {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(default)]
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteControlsParams {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(rename = "controlIDs")]
    pub control_ids: Vec<String>,
}

/// A bare control reference; the `onControlDelete` push only names ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRef {
    #[serde(rename = "controlID")]
    pub control_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRefs {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(default)]
    pub controls: Vec<ControlRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantsParams {
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// `getAllParticipants` params: return participants connected after `from`
/// (Unix ms).  The first page uses `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedParticipantsParams {
    pub from: u64,
}

/// `getActiveParticipants` params: participants with input after `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveParticipantsParams {
    pub threshold: u64,
}

/// One page of participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantsPage {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
}

impl ParticipantsPage {
    /// Cursor for the next page: the newest `connectedAt` seen on this one.
    pub fn next_cursor(&self) -> Option<u64> {
        self.participants.iter().map(|p| p.connected_at).max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeResult {
    /// Server clock, Unix milliseconds.
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureParams {
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
}

/// `issueMemoryWarning` push: the session is close to its server-side budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryWarning {
    #[serde(default)]
    pub used_bytes: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
}
