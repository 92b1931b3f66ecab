//! # Engine Errors
//!
//! Every engine operation returns exactly one of these kinds. The calling
//! layer maps them to its own surface (HTTP status, exit code) through
//! [`EngineError::code`].

use thiserror::Error;

use lims_core::{EntityId, EntityType, ValidationError};
use lims_state::{ConflictError, StateError};

/// Errors returned by the executor, the approval chain and the stores.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Structurally illegal move or failed workflow precondition.
    #[error("conflict: {0}")]
    Conflict(ConflictError),

    /// Entity absent, or outside the caller's organization.
    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: EntityType, id: EntityId },

    /// Caller's role or identity may not perform the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed input, rejected before any store access.
    #[error("validation error: {0}")]
    Validation(String),

    /// The store or the audit sink failed; the unit of work was rolled back.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// The conflict payload, if this is a conflict.
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn not_found(entity_type: EntityType, id: EntityId) -> Self {
        Self::NotFound { entity_type, id }
    }
}

impl From<ConflictError> for EngineError {
    fn from(err: ConflictError) -> Self {
        Self::Conflict(err)
    }
}

impl From<StateError> for EngineError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Conflict(c) => Self::Conflict(c),
            StateError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            // A stored status outside its vocabulary is corrupt data, not bad input.
            StateError::UnknownStatus { .. } => Self::Storage(err.to_string()),
            StateError::EntityTypeMismatch { .. } => Self::Validation(err.to_string()),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lims_core::Role;
    use lims_state::TestStatus;

    #[test]
    fn state_errors_map_to_engine_kinds() {
        let forbidden = StateError::Forbidden {
            entity_type: EntityType::Test,
            from: TestStatus::InReview.into(),
            to: TestStatus::Approved.into(),
            role: Some(Role::Analyst),
            required: vec![Role::Admin],
        };
        assert_eq!(EngineError::from(forbidden).code(), "FORBIDDEN");

        let unknown = StateError::UnknownStatus {
            entity_type: EntityType::Test,
            name: "LOST".into(),
        };
        assert_eq!(EngineError::from(unknown).code(), "STORAGE_ERROR");
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let err = EngineError::from(ValidationError::BlankField { field: "comments" });
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "validation error: comments must not be blank");
    }
}
