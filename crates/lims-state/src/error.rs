//! Errors raised by the lifecycle tables.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use lims_core::{EntityType, Role};

use crate::status::Status;

/// Why a transition was refused on structural or business grounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// The entity already holds the requested status.
    AlreadyInStatus,
    /// No rule in the table covers the requested move.
    NotPermitted,
    /// The move is in the table but a workflow precondition does not hold.
    PreconditionFailed { requirement: String },
}

impl ConflictKind {
    /// Stable machine code, matching the serialised `kind` tag.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInStatus => "ALREADY_IN_STATUS",
            Self::NotPermitted => "NOT_PERMITTED",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInStatus => f.write_str("already in this status"),
            Self::NotPermitted => f.write_str("transition not permitted"),
            Self::PreconditionFailed { requirement } => {
                write!(f, "precondition failed: {requirement}")
            }
        }
    }
}

/// A refused transition, with the legal alternatives from `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictError {
    pub entity_type: EntityType,
    pub current: Status,
    pub attempted: Status,
    /// Every target the table allows from `current`, in table order.
    pub allowed: Vec<Status>,
    #[serde(flatten)]
    pub kind: ConflictKind,
}

impl ConflictError {
    /// A workflow precondition failure on an otherwise tabled move.
    pub fn precondition(
        current: Status,
        attempted: Status,
        allowed: Vec<Status>,
        requirement: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: current.entity_type(),
            current,
            attempted,
            allowed,
            kind: ConflictKind::PreconditionFailed {
                requirement: requirement.into(),
            },
        }
    }
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}: {}; allowed: [",
            self.entity_type, self.current, self.attempted, self.kind
        )?;
        for (i, status) in self.allowed.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(status.as_str())?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for ConflictError {}

/// Errors from validation and authorization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The move is structurally illegal or a precondition failed.
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// The move is legal but the caller's role may not trigger it.
    #[error("{entity_type} {from} -> {to} requires one of {required:?}, caller role: {}", display_role(.role))]
    Forbidden {
        entity_type: EntityType,
        from: Status,
        to: Status,
        role: Option<Role>,
        required: Vec<Role>,
    },

    /// A status name outside the entity type's vocabulary.
    #[error("unknown {entity_type} status: {name:?}")]
    UnknownStatus { entity_type: EntityType, name: String },

    /// A status was checked against another entity type's table.
    #[error("status {status} belongs to {found}, not {expected}")]
    EntityTypeMismatch {
        expected: EntityType,
        found: EntityType,
        status: Status,
    },
}

impl StateError {
    /// The conflict payload, if this is a conflict.
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

fn display_role(role: &Option<Role>) -> &'static str {
    role.map_or("none", |r| r.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestStatus;

    fn conflict() -> ConflictError {
        ConflictError {
            entity_type: EntityType::Test,
            current: TestStatus::InReview.into(),
            attempted: TestStatus::Pending.into(),
            allowed: vec![TestStatus::Approved.into(), TestStatus::ReviewRejected.into()],
            kind: ConflictKind::NotPermitted,
        }
    }

    #[test]
    fn display_lists_alternatives() {
        let msg = conflict().to_string();
        assert!(msg.contains("IN_REVIEW -> PENDING"));
        assert!(msg.ends_with("allowed: [APPROVED, REVIEW_REJECTED]"));
    }

    #[test]
    fn serializes_flat_kind() {
        let json = serde_json::to_value(conflict()).unwrap();
        assert_eq!(json["kind"], "NOT_PERMITTED");
        assert_eq!(json["entityType"], "TEST");
        assert_eq!(json["allowed"][1], "REVIEW_REJECTED");

        let pre = ConflictError::precondition(
            TestStatus::Completed.into(),
            TestStatus::Approved.into(),
            vec![],
            "status must be IN_REVIEW",
        );
        assert_eq!(pre.kind.code(), "PRECONDITION_FAILED");
        let json = serde_json::to_value(pre).unwrap();
        assert_eq!(json["kind"], "PRECONDITION_FAILED");
        assert_eq!(json["requirement"], "status must be IN_REVIEW");
    }

    #[test]
    fn forbidden_without_role_says_none() {
        let err = StateError::Forbidden {
            entity_type: EntityType::Test,
            from: TestStatus::InReview.into(),
            to: TestStatus::Approved.into(),
            role: None,
            required: vec![Role::Admin],
        };
        assert!(err.to_string().ends_with("caller role: none"));
    }
}
