//! Resource models mirrored from the interactive service.
//!
//! Everything here is plain data plus the caller-side validation rules that
//! apply to it.  No I/O and no async: the client crate owns the connection
//! and the cache, and only uses these types to talk about resources.
//!
//! - **`scene`**: scenes and the tagged [`scene::Control`] variants they hold.
//! - **`group`**: participant groups, each pointing at a scene.
//! - **`participant`**: connected viewers and the `giveInput` payload.
//! - **`throttle`**: per-method bandwidth limits.
//! - **`validation`**: checks that run before a request is sent.

pub mod group;
pub mod participant;
pub mod scene;
pub mod throttle;
pub mod validation;

pub use group::{Group, DEFAULT_GROUP_ID};
pub use participant::{ControlInput, InputEvent, Participant};
pub use scene::{
    ButtonControl, Control, ControlKind, JoystickControl, LabelControl, Meta, Position, Scene,
    ScreenControl, TextboxControl, ViewportSize, DEFAULT_SCENE_ID,
};
pub use throttle::{ThrottleLimit, ThrottleSetting, ThrottleState};
pub use validation::{ResourceKind, ValidationError};
