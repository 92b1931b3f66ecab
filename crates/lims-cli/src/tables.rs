//! # Tables Subcommand
//!
//! Prints the effective transition tables as the engine sees them: authored
//! rules first, then the rules derived from wildcard targets, each with its
//! role restriction. Terminal statuses are listed at the end of each table.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use lims_core::EntityType;
use lims_state::{transitions, RuleOrigin, Status, TransitionTable};

/// Arguments for the `lims tables` subcommand.
#[derive(Args, Debug)]
pub struct TablesArgs {
    /// Print only this entity type (SAMPLE, TEST, ORDER or INVOICE).
    #[arg(long)]
    pub entity: Option<String>,

    /// Emit JSON instead of the text listing.
    #[arg(long)]
    pub json: bool,
}

/// JSON shape for one table.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableDocument<'a> {
    #[serde(flatten)]
    table: &'a TransitionTable,
    initial: Status,
    terminal: Vec<Status>,
}

/// Execute the tables subcommand.
pub fn run_tables(args: &TablesArgs) -> Result<u8> {
    let entity_types = match args.entity.as_deref() {
        Some(name) => vec![crate::parse_entity(name)?],
        None => EntityType::ALL.to_vec(),
    };
    let output = if args.json {
        render_json(&entity_types)?
    } else {
        render_text(&entity_types)
    };
    print!("{output}");
    Ok(0)
}

fn render_json(entity_types: &[EntityType]) -> Result<String> {
    let documents: Vec<TableDocument<'_>> = entity_types
        .iter()
        .map(|&entity_type| TableDocument {
            table: transitions(entity_type),
            initial: Status::initial(entity_type),
            terminal: Status::terminal(entity_type),
        })
        .collect();
    let mut json = serde_json::to_string_pretty(&documents)?;
    json.push('\n');
    Ok(json)
}

fn render_text(entity_types: &[EntityType]) -> String {
    let mut out = String::new();
    for (i, &entity_type) in entity_types.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_table(&mut out, transitions(entity_type));
    }
    out
}

fn render_table(out: &mut String, table: &TransitionTable) {
    let entity_type = table.entity_type();
    out.push_str(&format!(
        "{entity_type} (initial {})\n",
        Status::initial(entity_type)
    ));

    let width = table
        .rules()
        .iter()
        .map(|r| r.from.as_str().len())
        .max()
        .unwrap_or(0);

    let mut derived = 0usize;
    for rule in table.rules() {
        let marker = match rule.origin {
            RuleOrigin::Explicit => ' ',
            RuleOrigin::Wildcard => {
                derived += 1;
                '*'
            }
        };
        let roles = match rule.required_roles {
            Some(roles) => format!("  [{}]", crate::join_roles(roles)),
            None => String::new(),
        };
        out.push_str(&format!(
            " {marker} {:<width$} -> {}{roles}\n",
            rule.from.as_str(),
            rule.to.as_str(),
        ));
    }

    out.push_str(&format!(
        "  {} rules ({} derived), terminal: {}\n",
        table.rules().len(),
        derived,
        crate::join_statuses(&Status::terminal(entity_type)),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_marks_derived_rules() {
        let out = render_text(&[EntityType::Sample]);
        assert!(out.starts_with("SAMPLE (initial REGISTERED)"));
        assert!(out.contains("* RECEIVED"));
        assert!(out.contains("32 rules (14 derived)"));
        assert!(out.contains("terminal: DISPOSED, REJECTED, CANCELLED"));
    }

    #[test]
    fn text_shows_role_restrictions() {
        let out = render_text(&[EntityType::Test]);
        let line = out
            .lines()
            .find(|l| l.contains("IN_REVIEW") && l.contains("-> REVIEW_REJECTED"))
            .unwrap();
        assert!(line.contains("senior_analyst"), "{line}");
        assert!(!out.contains('*'));
    }

    #[test]
    fn all_tables_are_printed_by_default() {
        let out = render_text(&EntityType::ALL);
        for entity_type in EntityType::ALL {
            assert!(out.contains(&format!("{entity_type} (initial")));
        }
    }

    #[test]
    fn json_lists_rules_with_origin() {
        let json = render_json(&[EntityType::Sample]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let table = &value[0];
        assert_eq!(table["entityType"], "SAMPLE");
        assert_eq!(table["initial"], "REGISTERED");
        assert_eq!(table["terminal"].as_array().unwrap().len(), 3);
        let rules = table["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 32);
        assert!(rules.iter().any(|r| r["origin"] == "WILDCARD"));
    }
}
