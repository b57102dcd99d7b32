//! Scenes and the controls they contain.
//!
//! A scene is an ordered collection of controls shown to every participant in
//! a group pointing at it.  Controls are a tagged variant on the `kind` field:
//!
//! ```json
//! {"controlID":"fire","kind":"button","text":"Fire!","cost":0,"disabled":false,
//!  "position":[{"size":"large","width":10,"height":5,"x":0,"y":0}]}
//! ```
//!
//! Kind-specific fields live in the variant's struct; the shared fields
//! (`controlID`, `disabled`, `position`, `meta`) live on [`Control`].  The
//! `meta` bag keeps any keys the SDK does not understand so they survive a
//! read-modify-write round trip untouched.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Id of the scene that always exists and can never be deleted.
pub const DEFAULT_SCENE_ID: &str = "default";

/// Open-ended metadata attached to scenes, groups, controls and participants.
pub type Meta = serde_json::Map<String, Value>;

/// A scene as mirrored from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "sceneID")]
    pub scene_id: String,
    #[serde(default)]
    pub controls: Vec<Control>,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Scene {
    /// An empty scene with the given id.
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            controls: Vec::new(),
            meta: Meta::new(),
        }
    }

    /// Builder-style helper that appends a control.
    pub fn with_control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    /// Looks up a control by id.
    pub fn control(&self, control_id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.control_id == control_id)
    }

    pub fn control_mut(&mut self, control_id: &str) -> Option<&mut Control> {
        self.controls.iter_mut().find(|c| c.control_id == control_id)
    }

    pub fn is_default(&self) -> bool {
        self.scene_id == DEFAULT_SCENE_ID
    }
}

/// One interactive control inside a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    #[serde(rename = "controlID")]
    pub control_id: String,
    #[serde(default)]
    pub disabled: bool,
    /// Layout per viewport size.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub position: Vec<Position>,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    #[serde(flatten)]
    pub kind: ControlKind,
}

impl Control {
    /// A control of the given kind with no layout and no metadata.
    pub fn new(control_id: impl Into<String>, kind: ControlKind) -> Self {
        Self {
            control_id: control_id.into(),
            disabled: false,
            position: Vec::new(),
            meta: Meta::new(),
            kind,
        }
    }

    /// Shorthand for a button with a label.
    pub fn button(control_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            control_id,
            ControlKind::Button(ButtonControl {
                text: Some(text.into()),
                ..Default::default()
            }),
        )
    }

    /// Shorthand for a joystick with default sampling.
    pub fn joystick(control_id: impl Into<String>) -> Self {
        Self::new(control_id, ControlKind::Joystick(JoystickControl::default()))
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position.push(position);
        self
    }

    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }
}

/// Control kinds, discriminated by the `kind` field.
///
/// Kinds this SDK does not know decode as [`ControlKind::Unknown`] rather than
/// failing the whole scene.  The raw tag and every kind-specific key are kept
/// so the control encodes back exactly as it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Button(ButtonControl),
    Joystick(JoystickControl),
    Label(LabelControl),
    Textbox(TextboxControl),
    Screen(ScreenControl),
    Unknown { kind: String, fields: Meta },
}

impl ControlKind {
    /// The wire discriminator for this kind.
    pub fn name(&self) -> &str {
        match self {
            ControlKind::Button(_) => "button",
            ControlKind::Joystick(_) => "joystick",
            ControlKind::Label(_) => "label",
            ControlKind::Textbox(_) => "textbox",
            ControlKind::Screen(_) => "screen",
            ControlKind::Unknown { kind, .. } => kind,
        }
    }

    /// Whether both sides carry the same wire discriminator.
    pub fn same_kind(&self, other: &ControlKind) -> bool {
        self.name() == other.name()
    }

    /// The kind-specific keys, without the `kind` tag.
    fn fields(&self) -> Result<Meta, serde_json::Error> {
        let body = match self {
            ControlKind::Button(body) => serde_json::to_value(body)?,
            ControlKind::Joystick(body) => serde_json::to_value(body)?,
            ControlKind::Label(body) => serde_json::to_value(body)?,
            ControlKind::Textbox(body) => serde_json::to_value(body)?,
            ControlKind::Screen(body) => serde_json::to_value(body)?,
            ControlKind::Unknown { fields, .. } => return Ok(fields.clone()),
        };
        match body {
            Value::Object(fields) => Ok(fields),
            _ => Ok(Meta::new()),
        }
    }
}

impl Serialize for ControlKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.fields().map_err(ser::Error::custom)?;
        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
        map.serialize_entry("kind", self.name())?;
        for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != "kind") {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ControlKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Meta::deserialize(deserializer)?;
        let kind = match fields.remove("kind") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "control `kind` must be a string, got {other}"
                )))
            }
            None => return Err(de::Error::missing_field("kind")),
        };
        let parsed = match kind.as_str() {
            "button" => body(fields).map(ControlKind::Button),
            "joystick" => body(fields).map(ControlKind::Joystick),
            "label" => body(fields).map(ControlKind::Label),
            "textbox" => body(fields).map(ControlKind::Textbox),
            "screen" => body(fields).map(ControlKind::Screen),
            _ => return Ok(ControlKind::Unknown { kind, fields }),
        };
        parsed.map_err(de::Error::custom)
    }
}

fn body<T: DeserializeOwned>(fields: Meta) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(fields))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Spark cost charged when the button is pressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
    /// Fill level between 0 and 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Unix millisecond timestamp until which the button is cooling down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoystickControl {
    /// Milliseconds between coordinate samples sent by viewers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Direction indicator in radians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextboxControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_submit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_move_events: Option<bool>,
    /// Minimum milliseconds between move events from one viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_throttle: Option<u32>,
}

/// Where a control sits on one viewport size's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub size: ViewportSize,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportSize {
    Large,
    Medium,
    Small,
}
