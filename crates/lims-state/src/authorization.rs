//! # Authorization Filter
//!
//! Narrows the structural rule set to what one caller may trigger. A rule
//! without a role restriction is open to any authenticated caller. A
//! restricted rule requires the caller's role to be listed; a caller with
//! no role never passes a restricted rule.
//!
//! Everything here reads the cached tables and nothing else.

use lims_core::{EntityType, Role};

use crate::error::StateError;
use crate::status::Status;
use crate::table::{transitions, TransitionRule};
use crate::validator::validate_transition;

/// Whether `role` may trigger `rule`.
pub fn permits(rule: &TransitionRule, role: Option<Role>) -> bool {
    match (rule.required_roles, role) {
        (None, _) => true,
        (Some(required), Some(role)) => required.contains(&role),
        (Some(_), None) => false,
    }
}

/// Rules leaving `current` that `role` may trigger, in table order.
pub fn available_rules(
    entity_type: EntityType,
    current: Status,
    role: Option<Role>,
) -> Vec<&'static TransitionRule> {
    transitions(entity_type)
        .rules_from(current)
        .filter(|rule| permits(rule, role))
        .collect()
}

/// Target statuses reachable from `current` by `role`, in table order.
pub fn available_transitions(
    entity_type: EntityType,
    current: Status,
    role: Option<Role>,
) -> Vec<Status> {
    available_rules(entity_type, current, role)
        .into_iter()
        .map(|rule| rule.to)
        .collect()
}

/// Validate `current → target` structurally, then check `role` against it.
///
/// Conflict when the move is not in the table; Forbidden when it is but
/// the role may not trigger it.
pub fn authorize_transition(
    entity_type: EntityType,
    current: Status,
    target: Status,
    role: Option<Role>,
) -> Result<&'static TransitionRule, StateError> {
    let rule = validate_transition(entity_type, current, target)?;
    if permits(rule, role) {
        Ok(rule)
    } else {
        Err(StateError::Forbidden {
            entity_type,
            from: current,
            to: target,
            role,
            required: rule.required_roles.unwrap_or_default().to_vec(),
        })
    }
}
