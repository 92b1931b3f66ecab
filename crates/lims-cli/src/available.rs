//! # Available Subcommand
//!
//! Lists the moves out of one status. Without `--role` every structurally
//! legal move is shown; with it, only the ones that role may trigger.

use anyhow::Result;
use clap::Args;

use lims_core::{EntityType, Role};
use lims_state::{available_rules, transitions, RuleOrigin, Status};

/// Arguments for the `lims available` subcommand.
#[derive(Args, Debug)]
pub struct AvailableArgs {
    /// Entity type (SAMPLE, TEST, ORDER or INVOICE).
    #[arg(long)]
    pub entity: String,

    /// Current status.
    #[arg(long)]
    pub status: String,

    /// Only list moves this role may trigger.
    #[arg(long)]
    pub role: Option<String>,
}

/// Execute the available subcommand.
pub fn run_available(args: &AvailableArgs) -> Result<u8> {
    let entity_type = crate::parse_entity(&args.entity)?;
    let status = crate::parse_status(entity_type, &args.status)?;
    let role = crate::parse_role(args.role.as_deref())?;
    print!("{}", render(entity_type, status, role));
    Ok(0)
}

fn render(entity_type: EntityType, status: Status, role: Option<Role>) -> String {
    let rules = match role {
        Some(_) => available_rules(entity_type, status, role),
        None => transitions(entity_type).rules_from(status).collect(),
    };

    let mut out = match role {
        Some(role) => format!("{entity_type} {status} as {role}:\n"),
        None => format!("{entity_type} {status}:\n"),
    };
    if rules.is_empty() {
        let reason = if status.is_terminal() {
            "terminal status"
        } else {
            "no permitted moves"
        };
        out.push_str(&format!("  ({reason})\n"));
        return out;
    }
    for rule in rules {
        out.push_str(&format!("  -> {}", rule.to));
        if let Some(required) = rule.required_roles {
            out.push_str(&format!("  [{}]", crate::join_roles(required)));
        }
        if rule.origin == RuleOrigin::Wildcard {
            out.push_str("  (derived)");
        }
        out.push('\n');
    }
    out
}
