//! # Check Subcommand
//!
//! Answers whether a single move is legal, and, when `--role` is given,
//! whether that role may trigger it. A rejected move prints the statuses
//! that are reachable instead and exits with code 2.

use anyhow::Result;
use clap::Args;

use lims_core::{EntityType, Role};
use lims_state::{
    authorize_transition, available_transitions, validate_transition, StateError, Status,
};

/// Arguments for the `lims check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Entity type (SAMPLE, TEST, ORDER or INVOICE).
    #[arg(long)]
    pub entity: String,

    /// Current status.
    #[arg(long)]
    pub from: String,

    /// Requested status.
    #[arg(long)]
    pub to: String,

    /// Check the move for this role as well as structurally.
    #[arg(long)]
    pub role: Option<String>,
}

/// Execute the check subcommand.
///
/// Returns exit code: 0 when the move is allowed, 2 when it is not.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let entity_type = crate::parse_entity(&args.entity)?;
    let from = crate::parse_status(entity_type, &args.from)?;
    let to = crate::parse_status(entity_type, &args.to)?;
    let role = crate::parse_role(args.role.as_deref())?;

    let (report, code) = evaluate(entity_type, from, to, role)?;
    print!("{report}");
    Ok(code)
}

fn evaluate(
    entity_type: EntityType,
    from: Status,
    to: Status,
    role: Option<Role>,
) -> Result<(String, u8)> {
    let outcome = match role {
        Some(_) => authorize_transition(entity_type, from, to, role),
        None => validate_transition(entity_type, from, to),
    };

    match outcome {
        Ok(rule) => {
            let mut report = format!("OK: {entity_type} {from} -> {to}\n");
            if let Some(required) = rule.required_roles {
                report.push_str(&format!(
                    "  restricted to: {}\n",
                    crate::join_roles(required)
                ));
            }
            Ok((report, 0))
        }
        Err(StateError::Conflict(conflict)) => {
            tracing::debug!(%conflict, "move rejected");
            let report = format!(
                "REJECTED: {entity_type} {from} -> {to}: {}\n  allowed: {}\n",
                conflict.kind.code(),
                crate::join_statuses(&conflict.allowed),
            );
            Ok((report, 2))
        }
        Err(StateError::Forbidden { required, .. }) => {
            let for_role = available_transitions(entity_type, from, role);
            let report = format!(
                "FORBIDDEN: {entity_type} {from} -> {to} requires one of: {}\n  allowed for {}: {}\n",
                crate::join_roles(&required),
                role.map_or("no role", |r| r.as_str()),
                crate::join_statuses(&for_role),
            );
            Ok((report, 2))
        }
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lims_state::{SampleStatus, TestStatus};

    #[test]
    fn legal_move_exits_zero() {
        let (report, code) = evaluate(
            EntityType::Sample,
            SampleStatus::Received.into(),
            SampleStatus::InStorage.into(),
            None,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert_eq!(report, "OK: SAMPLE RECEIVED -> IN_STORAGE\n");
    }

    #[test]
    fn restricted_move_lists_its_roles() {
        let (report, code) = evaluate(
            EntityType::Test,
            TestStatus::InReview.into(),
            TestStatus::Approved.into(),
            Some(Role::SeniorAnalyst),
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(report.contains("restricted to: admin, lab_manager"));
    }

    #[test]
    fn illegal_move_lists_alternatives() {
        let (report, code) = evaluate(
            EntityType::Sample,
            SampleStatus::Received.into(),
            SampleStatus::Reported.into(),
            None,
        )
        .unwrap();
        assert_eq!(code, 2);
        assert!(report.starts_with("REJECTED: SAMPLE RECEIVED -> REPORTED: NOT_PERMITTED"));
        assert!(report.contains("IN_STORAGE"));
        assert!(report.contains("ON_HOLD"));
    }

    #[test]
    fn identity_move_is_rejected() {
        let (report, code) = evaluate(
            EntityType::Test,
            TestStatus::Completed.into(),
            TestStatus::Completed.into(),
            None,
        )
        .unwrap();
        assert_eq!(code, 2);
        assert!(report.contains("ALREADY_IN_STATUS"));
    }

    #[test]
    fn unprivileged_role_is_forbidden() {
        let (report, code) = evaluate(
            EntityType::Test,
            TestStatus::InReview.into(),
            TestStatus::Approved.into(),
            Some(Role::Analyst),
        )
        .unwrap();
        assert_eq!(code, 2);
        assert!(report.starts_with("FORBIDDEN: TEST IN_REVIEW -> APPROVED"));
        assert!(report.contains("allowed for analyst: (none)"));
    }
}
