//! # Roles
//!
//! Laboratory roles used for transition gating and approval-chain checks.
//! Roles are a flat set, not a privilege ladder: membership in a rule's
//! role set is the only question ever asked, so there is no `Ord`-based
//! "at least" comparison here.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A laboratory role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System administrator.
    Admin,
    /// Laboratory manager; final approver.
    LabManager,
    /// Quality assurance manager; final approver.
    QualityManager,
    /// Senior analyst; eligible peer reviewer.
    SeniorAnalyst,
    /// Bench analyst performing tests.
    Analyst,
    /// Laboratory technician handling samples.
    Technician,
    /// Front-desk sample reception.
    Receptionist,
    /// Accounts receivable.
    BillingClerk,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 8] = [
        Self::Admin,
        Self::LabManager,
        Self::QualityManager,
        Self::SeniorAnalyst,
        Self::Analyst,
        Self::Technician,
        Self::Receptionist,
        Self::BillingClerk,
    ];

    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::LabManager => "lab_manager",
            Self::QualityManager => "quality_manager",
            Self::SeniorAnalyst => "senior_analyst",
            Self::Analyst => "analyst",
            Self::Technician => "technician",
            Self::Receptionist => "receptionist",
            Self::BillingClerk => "billing_clerk",
        }
    }

    /// Parse a snake_case role name.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| ValidationError::UnknownRole(name.to_string()))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_name(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_rejected() {
        assert_eq!(
            "LabManager".parse::<Role>(),
            Err(ValidationError::UnknownRole("LabManager".to_string()))
        );
    }

    #[test]
    fn serde_matches_as_str() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
