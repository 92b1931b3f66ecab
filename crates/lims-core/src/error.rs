//! # Validation Errors
//!
//! Malformed input is rejected with a [`ValidationError`] before the
//! engine touches any store. Every variant names the offending value so
//! the calling layer can report it without re-parsing the message.

use thiserror::Error;

/// Input rejected before any store access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Entity type name is not one of `SAMPLE`, `TEST`, `ORDER`, `INVOICE`.
    #[error("unknown entity type: {0:?}")]
    UnknownEntityType(String),

    /// Role name is not part of the closed role enumeration.
    #[error("unknown role: {0:?}")]
    UnknownRole(String),

    /// A free-text field that must carry content was empty or whitespace.
    #[error("{field} must not be blank")]
    BlankField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Transition metadata must be a JSON object when present.
    #[error("metadata must be a JSON object, got {0}")]
    InvalidMetadata(&'static str),

    /// Configuration document failed to parse or violated a constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ValidationError {
    /// Reject `value` if it is empty or whitespace-only.
    pub fn require_non_blank(field: &'static str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            return Err(Self::BlankField { field });
        }
        Ok(())
    }

    /// Reject metadata that is present but not a JSON object.
    pub fn require_object(value: &serde_json::Value) -> Result<(), Self> {
        let kind = match value {
            serde_json::Value::Object(_) => return Ok(()),
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
        };
        Err(Self::InvalidMetadata(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_field_rejected() {
        assert_eq!(
            ValidationError::require_non_blank("comments", "   "),
            Err(ValidationError::BlankField { field: "comments" })
        );
        assert!(ValidationError::require_non_blank("comments", "ok").is_ok());
    }

    #[test]
    fn metadata_must_be_object() {
        assert!(ValidationError::require_object(&json!({"reason": "x"})).is_ok());
        assert_eq!(
            ValidationError::require_object(&json!([1, 2])),
            Err(ValidationError::InvalidMetadata("array"))
        );
        assert_eq!(
            ValidationError::require_object(&json!("text")),
            Err(ValidationError::InvalidMetadata("string"))
        );
    }

    #[test]
    fn display_names_offending_value() {
        let err = ValidationError::UnknownRole("wizard".to_string());
        assert!(err.to_string().contains("wizard"));
        let err = ValidationError::BlankField { field: "reason" };
        assert_eq!(err.to_string(), "reason must not be blank");
    }
}
