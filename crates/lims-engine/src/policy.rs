//! # Approval Policy
//!
//! Which roles may review and which may give final approval. The default
//! is read off the Test transition table:
//!
//! - reviewer roles gate `IN_REVIEW → REVIEW_REJECTED`
//! - approver roles gate `COMPLETED → APPROVED`
//!
//! A deployment may load a narrower policy from YAML:
//!
//! ```yaml
//! reviewerRoles: [quality_manager, senior_analyst]
//! approverRoles: [quality_manager]
//! requireRejectComments: true
//! ```
//!
//! A policy naming a role the table does not already allow is rejected.
//! Widening happens in the table, where it is reviewed with the rest of
//! the lifecycle, and never in configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lims_core::{EntityType, Role, ValidationError};
use lims_state::{transitions, TestStatus};

/// Role sets used by the approval chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ApprovalPolicy {
    pub reviewer_roles: Vec<Role>,
    pub approver_roles: Vec<Role>,
    /// Whether a review rejection must carry comments.
    pub require_reject_comments: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            reviewer_roles: table_roles(TestStatus::InReview, TestStatus::ReviewRejected),
            approver_roles: table_roles(TestStatus::Completed, TestStatus::Approved),
            require_reject_comments: true,
        }
    }
}

fn table_roles(from: TestStatus, to: TestStatus) -> Vec<Role> {
    transitions(EntityType::Test)
        .find(from.into(), to.into())
        .and_then(|rule| rule.required_roles)
        .map(<[Role]>::to_vec)
        .unwrap_or_default()
}

impl ApprovalPolicy {
    /// Parse and validate a YAML policy document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ValidationError> {
        let policy: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ValidationError::InvalidConfig(format!("approval policy: {e}")))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read, parse and validate a YAML policy file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidConfig(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject empty role sets and any role outside the table's sets.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let table = Self::default();
        check_subset("reviewerRoles", &self.reviewer_roles, &table.reviewer_roles)?;
        check_subset("approverRoles", &self.approver_roles, &table.approver_roles)
    }

    pub fn may_review(&self, role: Role) -> bool {
        self.reviewer_roles.contains(&role)
    }

    pub fn may_approve(&self, role: Role) -> bool {
        self.approver_roles.contains(&role)
    }

    /// Whether `role` sees the approval queue at all.
    pub fn may_see_queue(&self, role: Role) -> bool {
        self.may_review(role) || self.may_approve(role)
    }
}

fn check_subset(field: &str, configured: &[Role], allowed: &[Role]) -> Result<(), ValidationError> {
    if configured.is_empty() {
        return Err(ValidationError::InvalidConfig(format!("{field} must not be empty")));
    }
    if let Some(role) = configured.iter().find(|r| !allowed.contains(*r)) {
        return Err(ValidationError::InvalidConfig(format!(
            "{field} may not include {role}; the Test table allows only {}",
            allowed.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(())
}
