//! # lims-cli: Lifecycle Table Command-Line Interface
//!
//! Read-only tooling over the lifecycle tables and approval policy. Nothing
//! here touches a store; every subcommand answers from the cached tables.
//!
//! ## Subcommands
//!
//! - `tables`: print the effective tables, authored and derived rules
//! - `check`: is one move legal, and permitted for a role
//! - `available`: the moves a role may trigger from a status
//! - `policy`: print the effective approval policy, or validate a file
//!
//! ## Crate Policy
//!
//! - Argument parsing lives beside each handler; `main.rs` only dispatches.
//! - Handlers return an exit code: 0 success, 2 for a rejected check,
//!   1 for operational errors raised through `anyhow`.
//! - Output is rendered into a `String` first so it can be tested.

pub mod available;
pub mod check;
pub mod policy;
pub mod tables;

use anyhow::{Context, Result};
use lims_core::{EntityType, Role};
use lims_state::Status;

/// Parse an entity type name given on the command line.
pub(crate) fn parse_entity(name: &str) -> Result<EntityType> {
    EntityType::from_name(name).with_context(|| format!("--entity {name}"))
}

/// Parse a status name for `entity_type`. Case-insensitive.
pub(crate) fn parse_status(entity_type: EntityType, name: &str) -> Result<Status> {
    Status::parse(entity_type, &name.to_ascii_uppercase())
        .with_context(|| format!("{name} is not a {entity_type} status"))
}

/// Parse an optional role name.
pub(crate) fn parse_role(name: Option<&str>) -> Result<Option<Role>> {
    name.map(|n| Role::from_name(n).with_context(|| format!("--role {n}")))
        .transpose()
}

/// Render a status list as `A, B, C`, or `(none)`.
pub(crate) fn join_statuses(statuses: &[Status]) -> String {
    if statuses.is_empty() {
        return "(none)".to_string();
    }
    statuses
        .iter()
        .map(Status::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a role list as `a, b`.
pub(crate) fn join_roles(roles: &[Role]) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lims_state::SampleStatus;

    #[test]
    fn status_names_are_case_insensitive() {
        let status = parse_status(EntityType::Sample, "in_storage").unwrap();
        assert_eq!(status, Status::Sample(SampleStatus::InStorage));
    }

    #[test]
    fn status_from_another_vocabulary_is_rejected() {
        let err = parse_status(EntityType::Invoice, "IN_STORAGE").unwrap_err();
        assert!(format!("{err:#}").contains("INVOICE"));
    }

    #[test]
    fn missing_role_is_none() {
        assert_eq!(parse_role(None).unwrap(), None);
        assert_eq!(parse_role(Some("analyst")).unwrap(), Some(Role::Analyst));
        assert!(parse_role(Some("intern")).is_err());
    }

    #[test]
    fn empty_status_list_renders_placeholder() {
        assert_eq!(join_statuses(&[]), "(none)");
    }
}
