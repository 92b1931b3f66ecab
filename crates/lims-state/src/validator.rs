//! # Transition Validator
//!
//! The structural check: is `current → target` in the table for this
//! entity type? Roles are not considered here; see
//! [`crate::authorization`].
//!
//! An identity move (`current == target`) is always a conflict. Re-saving
//! the same status through the lifecycle path is never a silent success.

use lims_core::EntityType;

use crate::error::{ConflictError, ConflictKind, StateError};
use crate::status::Status;
use crate::table::{transitions, TransitionRule};

/// Validate `current → target` for `entity_type`.
///
/// Returns the matching rule on success. On failure the conflict carries
/// every legal target from `current`, so the caller can correct itself
/// without a second lookup.
pub fn validate_transition(
    entity_type: EntityType,
    current: Status,
    target: Status,
) -> Result<&'static TransitionRule, StateError> {
    for status in [current, target] {
        if status.entity_type() != entity_type {
            return Err(StateError::EntityTypeMismatch {
                expected: entity_type,
                found: status.entity_type(),
                status,
            });
        }
    }

    let table = transitions(entity_type);
    let kind = if current == target {
        ConflictKind::AlreadyInStatus
    } else {
        match table.find(current, target) {
            Some(rule) => return Ok(rule),
            None => ConflictKind::NotPermitted,
        }
    };

    Err(ConflictError {
        entity_type,
        current,
        attempted: target,
        allowed: table.targets_from(current),
        kind,
    }
    .into())
}

/// Boolean form of [`validate_transition`].
pub fn is_valid_transition(entity_type: EntityType, current: Status, target: Status) -> bool {
    validate_transition(entity_type, current, target).is_ok()
}
