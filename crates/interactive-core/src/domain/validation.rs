//! Caller-side preconditions checked before anything reaches the wire.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::domain::scene::Control;
use crate::domain::throttle::ThrottleSetting;

/// Which kind of resource a validation error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Scene,
    Group,
    Control,
    Participant,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Scene => "scene",
            ResourceKind::Group => "group",
            ResourceKind::Control => "control",
            ResourceKind::Participant => "participant",
        })
    }
}

/// A request that would be rejected before being sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{resource} id must not be empty")]
    EmptyId { resource: ResourceKind },

    #[error("nothing to send: the {resource} list is empty")]
    EmptyBatch { resource: ResourceKind },

    #[error("duplicate {resource} id `{id}` in one request")]
    DuplicateId { resource: ResourceKind, id: String },

    #[error("the reserved {resource} `{id}` cannot be deleted")]
    ReservedId { resource: ResourceKind, id: String },

    #[error("{resource} `{id}` cannot be reassigned to itself")]
    SelfReassignment { resource: ResourceKind, id: String },

    #[error("reassignment target {resource} `{target}` is not known")]
    UnknownTarget {
        resource: ResourceKind,
        target: String,
    },

    #[error("control `{control_id}` cannot change kind from {from} to {to}")]
    KindChanged {
        control_id: String,
        from: String,
        to: String,
    },

    #[error("throttle for `{method}` needs a positive capacity and period")]
    InvalidThrottle { method: String },
}

/// Checks a delete-with-reassignment request.
///
/// `reserved` is the id that can never be deleted (`"default"`); it is also
/// always an acceptable target.  Any other target must satisfy `is_known`.
pub fn validate_reassignment(
    resource: ResourceKind,
    id: &str,
    target: &str,
    reserved: &str,
    is_known: impl Fn(&str) -> bool,
) -> Result<(), ValidationError> {
    if id.is_empty() || target.is_empty() {
        return Err(ValidationError::EmptyId { resource });
    }
    if id == reserved {
        return Err(ValidationError::ReservedId {
            resource,
            id: id.to_string(),
        });
    }
    if id == target {
        return Err(ValidationError::SelfReassignment {
            resource,
            id: id.to_string(),
        });
    }
    if target != reserved && !is_known(target) {
        return Err(ValidationError::UnknownTarget {
            resource,
            target: target.to_string(),
        });
    }
    Ok(())
}

/// Checks that a batch is non-empty and its ids are non-empty and unique.
pub fn validate_batch_ids<'a>(
    resource: ResourceKind,
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(ValidationError::EmptyId { resource });
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId {
                resource,
                id: id.to_string(),
            });
        }
    }
    if seen.is_empty() {
        return Err(ValidationError::EmptyBatch { resource });
    }
    Ok(())
}

/// A control's kind is fixed at creation.
pub fn validate_kind_unchanged(cached: &Control, proposed: &Control) -> Result<(), ValidationError> {
    if cached.kind.same_kind(&proposed.kind) {
        Ok(())
    } else {
        Err(ValidationError::KindChanged {
            control_id: proposed.control_id.clone(),
            from: cached.kind_name().to_string(),
            to: proposed.kind_name().to_string(),
        })
    }
}

pub fn validate_throttle(setting: &ThrottleSetting) -> Result<(), ValidationError> {
    if setting.method.is_empty() || setting.capacity_per_period == 0 || setting.period_millis == 0
    {
        return Err(ValidationError::InvalidThrottle {
            method: setting.method.clone(),
        });
    }
    Ok(())
}
