//! Client-side mirror of server-owned resources.
//!
//! The cache is read-through: it only ever changes in response to something
//! the server said, either a successful reply or a push event.  Entities are
//! replaced wholesale, never field-merged, so a cached copy is always one the
//! server actually sent.  The whole mirror is cleared on disconnect.
//!
//! All state sits behind one `std::sync::Mutex` that is never held across an
//! `.await`; accessors return clones.

use std::collections::HashMap;
use std::sync::Mutex;

use interactive_core::protocol::methods::{ControlRefs, ControlsParams};
use interactive_core::{Control, Group, Participant, Scene, ServerEvent};
use tracing::debug;
use uuid::Uuid;

use crate::application::lock;

#[derive(Debug, Default)]
struct Mirror {
    scenes: HashMap<String, Scene>,
    groups: HashMap<String, Group>,
    participants: HashMap<Uuid, Participant>,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    mirror: Mutex<Mirror>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Scenes ────────────────────────────────────────────────────────────────

    /// Replaces the whole scene collection.
    pub fn replace_scenes(&self, scenes: Vec<Scene>) {
        let mut mirror = lock(&self.mirror);
        mirror.scenes = scenes.into_iter().map(|s| (s.scene_id.clone(), s)).collect();
    }

    pub fn upsert_scenes(&self, scenes: Vec<Scene>) {
        let mut mirror = lock(&self.mirror);
        for scene in scenes {
            mirror.scenes.insert(scene.scene_id.clone(), scene);
        }
    }

    /// Removes a scene and evicts the groups that showed it.
    ///
    /// Where those groups went is the server's call; they come back with the
    /// next group read or push.
    pub fn remove_scene(&self, scene_id: &str) {
        let mut mirror = lock(&self.mirror);
        mirror.scenes.remove(scene_id);
        mirror.groups.retain(|_, group| group.scene_id != scene_id);
    }

    pub fn scene(&self, scene_id: &str) -> Option<Scene> {
        lock(&self.mirror).scenes.get(scene_id).cloned()
    }

    pub fn has_scene(&self, scene_id: &str) -> bool {
        lock(&self.mirror).scenes.contains_key(scene_id)
    }

    /// All cached scenes, sorted by id.
    pub fn scenes(&self) -> Vec<Scene> {
        let mut scenes: Vec<_> = lock(&self.mirror).scenes.values().cloned().collect();
        scenes.sort_by(|a, b| a.scene_id.cmp(&b.scene_id));
        scenes
    }

    // ── Controls ──────────────────────────────────────────────────────────────

    /// Replaces (or appends) controls inside a cached scene.
    ///
    /// Controls for a scene the cache has never seen are ignored: a scene is
    /// only mirrored once the server has described it in full.
    pub fn upsert_controls(&self, scene_id: &str, controls: Vec<Control>) {
        let mut mirror = lock(&self.mirror);
        let Some(scene) = mirror.scenes.get_mut(scene_id) else {
            debug!(scene_id, "controls for an uncached scene (not mirrored)");
            return;
        };
        for control in controls {
            match scene.control_mut(&control.control_id) {
                Some(existing) => *existing = control,
                None => scene.controls.push(control),
            }
        }
    }

    pub fn remove_controls<'a>(&self, scene_id: &str, control_ids: impl IntoIterator<Item = &'a str>) {
        let mut mirror = lock(&self.mirror);
        if let Some(scene) = mirror.scenes.get_mut(scene_id) {
            for id in control_ids {
                scene.controls.retain(|c| c.control_id != id);
            }
        }
    }

    pub fn control(&self, scene_id: &str, control_id: &str) -> Option<Control> {
        lock(&self.mirror)
            .scenes
            .get(scene_id)
            .and_then(|s| s.control(control_id))
            .cloned()
    }

    // ── Groups ────────────────────────────────────────────────────────────────

    pub fn replace_groups(&self, groups: Vec<Group>) {
        let mut mirror = lock(&self.mirror);
        mirror.groups = groups.into_iter().map(|g| (g.group_id.clone(), g)).collect();
    }

    pub fn upsert_groups(&self, groups: Vec<Group>) {
        let mut mirror = lock(&self.mirror);
        for group in groups {
            mirror.groups.insert(group.group_id.clone(), group);
        }
    }

    /// Removes a group and evicts the participants that were in it.
    pub fn remove_group(&self, group_id: &str) {
        let mut mirror = lock(&self.mirror);
        mirror.groups.remove(group_id);
        mirror.participants.retain(|_, participant| participant.group_id != group_id);
    }

    pub fn group(&self, group_id: &str) -> Option<Group> {
        lock(&self.mirror).groups.get(group_id).cloned()
    }

    pub fn has_group(&self, group_id: &str) -> bool {
        lock(&self.mirror).groups.contains_key(group_id)
    }

    /// All cached groups, sorted by id.
    pub fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<_> = lock(&self.mirror).groups.values().cloned().collect();
        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        groups
    }

    // ── Participants ──────────────────────────────────────────────────────────

    pub fn replace_participants(&self, participants: Vec<Participant>) {
        let mut mirror = lock(&self.mirror);
        mirror.participants = participants
            .into_iter()
            .map(|p| (p.session_id, p))
            .collect();
    }

    pub fn upsert_participants(&self, participants: Vec<Participant>) {
        let mut mirror = lock(&self.mirror);
        for participant in participants {
            mirror.participants.insert(participant.session_id, participant);
        }
    }

    pub fn remove_participants(&self, session_ids: impl IntoIterator<Item = Uuid>) {
        let mut mirror = lock(&self.mirror);
        for id in session_ids {
            mirror.participants.remove(&id);
        }
    }

    pub fn participant(&self, session_id: Uuid) -> Option<Participant> {
        lock(&self.mirror).participants.get(&session_id).cloned()
    }

    /// All cached participants, oldest connection first.
    pub fn participants(&self) -> Vec<Participant> {
        let mut participants: Vec<_> = lock(&self.mirror).participants.values().cloned().collect();
        participants.sort_by_key(|p| (p.connected_at, p.session_id));
        participants
    }

    // ── Push events / lifecycle ───────────────────────────────────────────────

    /// Mirrors a resource push.  Non-resource events are ignored.
    pub fn apply_event(&self, event: &ServerEvent) {
        match event {
            ServerEvent::SceneCreate(scenes) | ServerEvent::SceneUpdate(scenes) => {
                self.upsert_scenes(scenes.clone());
            }
            ServerEvent::SceneDelete(params) => {
                self.remove_scene(&params.scene_id);
            }
            ServerEvent::GroupCreate(groups) | ServerEvent::GroupUpdate(groups) => {
                self.upsert_groups(groups.clone());
            }
            ServerEvent::GroupDelete(params) => {
                self.remove_group(&params.group_id);
            }
            ServerEvent::ControlCreate(ControlsParams { scene_id, controls })
            | ServerEvent::ControlUpdate(ControlsParams { scene_id, controls }) => {
                self.upsert_controls(scene_id, controls.clone());
            }
            ServerEvent::ControlDelete(ControlRefs { scene_id, controls }) => {
                self.remove_controls(scene_id, controls.iter().map(|c| c.control_id.as_str()));
            }
            ServerEvent::ParticipantJoin(participants)
            | ServerEvent::ParticipantUpdate(participants) => {
                self.upsert_participants(participants.clone());
            }
            ServerEvent::ParticipantLeave(participants) => {
                self.remove_participants(participants.iter().map(|p| p.session_id));
            }
            ServerEvent::Hello
            | ServerEvent::Ready(_)
            | ServerEvent::GiveInput(_)
            | ServerEvent::MemoryWarning(_)
            | ServerEvent::Other { .. } => {}
        }
    }

    /// Forgets everything.
    pub fn clear(&self) {
        let mut mirror = lock(&self.mirror);
        *mirror = Mirror::default();
    }

    pub fn is_empty(&self) -> bool {
        let mirror = lock(&self.mirror);
        mirror.scenes.is_empty() && mirror.groups.is_empty() && mirror.participants.is_empty()
    }
}
