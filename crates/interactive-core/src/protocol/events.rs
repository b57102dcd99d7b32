//! Typed view of server-initiated method calls.
//!
//! The server pushes `method` (or `event`) packets without a meaningful id.
//! [`ServerEvent::decode`] turns the method name plus params into one of the
//! variants below.  Methods this SDK has no type for become
//! [`ServerEvent::Other`] so a host can still observe them.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{Group, InputEvent, Participant, Scene};
use crate::protocol::codec::ProtocolError;
use crate::protocol::methods::{
    ControlRefs, ControlsParams, DeleteGroupParams, DeleteSceneParams, GroupsParams,
    MemoryWarning, ParticipantsParams, ReadyParams, ScenesParams,
};

pub const HELLO: &str = "hello";
pub const ON_READY: &str = "onReady";
pub const ON_PARTICIPANT_JOIN: &str = "onParticipantJoin";
pub const ON_PARTICIPANT_LEAVE: &str = "onParticipantLeave";
pub const ON_PARTICIPANT_UPDATE: &str = "onParticipantUpdate";
pub const ON_GROUP_CREATE: &str = "onGroupCreate";
pub const ON_GROUP_UPDATE: &str = "onGroupUpdate";
pub const ON_GROUP_DELETE: &str = "onGroupDelete";
pub const ON_SCENE_CREATE: &str = "onSceneCreate";
pub const ON_SCENE_UPDATE: &str = "onSceneUpdate";
pub const ON_SCENE_DELETE: &str = "onSceneDelete";
pub const ON_CONTROL_CREATE: &str = "onControlCreate";
pub const ON_CONTROL_UPDATE: &str = "onControlUpdate";
pub const ON_CONTROL_DELETE: &str = "onControlDelete";
pub const GIVE_INPUT: &str = "giveInput";
pub const ISSUE_MEMORY_WARNING: &str = "issueMemoryWarning";

/// A decoded server push.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// First packet after the socket opens.
    Hello,
    Ready(bool),
    ParticipantJoin(Vec<Participant>),
    ParticipantLeave(Vec<Participant>),
    ParticipantUpdate(Vec<Participant>),
    GroupCreate(Vec<Group>),
    GroupUpdate(Vec<Group>),
    GroupDelete(DeleteGroupParams),
    SceneCreate(Vec<Scene>),
    SceneUpdate(Vec<Scene>),
    SceneDelete(DeleteSceneParams),
    ControlCreate(ControlsParams),
    ControlUpdate(ControlsParams),
    ControlDelete(ControlRefs),
    GiveInput(InputEvent),
    MemoryWarning(MemoryWarning),
    Other { method: String, params: Value },
}

impl ServerEvent {
    /// Decodes the params of a server method into its typed variant.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedParams`] when a known method's params do not
    /// match its shape.  Unknown methods never fail.
    pub fn decode(method: &str, params: Value) -> Result<Self, ProtocolError> {
        Ok(match method {
            HELLO => ServerEvent::Hello,
            ON_READY => ServerEvent::Ready(parse::<ReadyParams>(method, params)?.is_ready),
            ON_PARTICIPANT_JOIN => ServerEvent::ParticipantJoin(participants(method, params)?),
            ON_PARTICIPANT_LEAVE => ServerEvent::ParticipantLeave(participants(method, params)?),
            ON_PARTICIPANT_UPDATE => ServerEvent::ParticipantUpdate(participants(method, params)?),
            ON_GROUP_CREATE => ServerEvent::GroupCreate(groups(method, params)?),
            ON_GROUP_UPDATE => ServerEvent::GroupUpdate(groups(method, params)?),
            ON_GROUP_DELETE => ServerEvent::GroupDelete(parse(method, params)?),
            ON_SCENE_CREATE => ServerEvent::SceneCreate(scenes(method, params)?),
            ON_SCENE_UPDATE => ServerEvent::SceneUpdate(scenes(method, params)?),
            ON_SCENE_DELETE => ServerEvent::SceneDelete(parse(method, params)?),
            ON_CONTROL_CREATE => ServerEvent::ControlCreate(parse(method, params)?),
            ON_CONTROL_UPDATE => ServerEvent::ControlUpdate(parse(method, params)?),
            ON_CONTROL_DELETE => ServerEvent::ControlDelete(parse(method, params)?),
            GIVE_INPUT => ServerEvent::GiveInput(parse(method, params)?),
            ISSUE_MEMORY_WARNING => ServerEvent::MemoryWarning(parse(method, params)?),
            _ => ServerEvent::Other {
                method: method.to_string(),
                params,
            },
        })
    }

    /// The wire method name this event came from.
    pub fn method(&self) -> &str {
        match self {
            ServerEvent::Hello => HELLO,
            ServerEvent::Ready(_) => ON_READY,
            ServerEvent::ParticipantJoin(_) => ON_PARTICIPANT_JOIN,
            ServerEvent::ParticipantLeave(_) => ON_PARTICIPANT_LEAVE,
            ServerEvent::ParticipantUpdate(_) => ON_PARTICIPANT_UPDATE,
            ServerEvent::GroupCreate(_) => ON_GROUP_CREATE,
            ServerEvent::GroupUpdate(_) => ON_GROUP_UPDATE,
            ServerEvent::GroupDelete(_) => ON_GROUP_DELETE,
            ServerEvent::SceneCreate(_) => ON_SCENE_CREATE,
            ServerEvent::SceneUpdate(_) => ON_SCENE_UPDATE,
            ServerEvent::SceneDelete(_) => ON_SCENE_DELETE,
            ServerEvent::ControlCreate(_) => ON_CONTROL_CREATE,
            ServerEvent::ControlUpdate(_) => ON_CONTROL_UPDATE,
            ServerEvent::ControlDelete(_) => ON_CONTROL_DELETE,
            ServerEvent::GiveInput(_) => GIVE_INPUT,
            ServerEvent::MemoryWarning(_) => ISSUE_MEMORY_WARNING,
            ServerEvent::Other { method, .. } => method,
        }
    }
}

fn parse<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(params).map_err(|e| ProtocolError::MalformedParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn participants(method: &str, params: Value) -> Result<Vec<Participant>, ProtocolError> {
    Ok(parse::<ParticipantsParams>(method, params)?.participants)
}

fn groups(method: &str, params: Value) -> Result<Vec<Group>, ProtocolError> {
    Ok(parse::<GroupsParams>(method, params)?.groups)
}

fn scenes(method: &str, params: Value) -> Result<Vec<Scene>, ProtocolError> {
    Ok(parse::<ScenesParams>(method, params)?.scenes)
}
