//! Participant groups.
//!
//! Every participant belongs to exactly one group, and every group points at
//! the scene its members currently see.  The group references the scene; it
//! does not own it.

use serde::{Deserialize, Serialize};

use crate::domain::scene::{Meta, DEFAULT_SCENE_ID};

/// Id of the group that always exists and can never be deleted.
pub const DEFAULT_GROUP_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "sceneID", default = "default_scene_id")]
    pub scene_id: String,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Group {
    pub fn new(group_id: impl Into<String>, scene_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            scene_id: scene_id.into(),
            meta: Meta::new(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.group_id == DEFAULT_GROUP_ID
    }
}

fn default_scene_id() -> String {
    DEFAULT_SCENE_ID.to_string()
}
