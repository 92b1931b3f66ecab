//! # Policy Subcommand
//!
//! Prints the effective approval policy as YAML. With `--file`, the file is
//! loaded and validated first, so a policy that widens the table's reviewer
//! or approver sets fails here before any deployment picks it up.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use lims_engine::ApprovalPolicy;

/// Arguments for the `lims policy` subcommand.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    /// Approval policy YAML to validate. Defaults to the table-derived policy.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

/// Execute the policy subcommand.
pub fn run_policy(args: &PolicyArgs) -> Result<u8> {
    let policy = load(args.file.as_deref())?;
    print!("{}", serde_yaml::to_string(&policy)?);
    Ok(0)
}

fn load(file: Option<&Path>) -> Result<ApprovalPolicy> {
    match file {
        Some(path) => {
            let policy = ApprovalPolicy::from_path(path)
                .with_context(|| format!("invalid approval policy {}", path.display()))?;
            tracing::info!(path = %path.display(), "approval policy is valid");
            Ok(policy)
        }
        None => Ok(ApprovalPolicy::default()),
    }
}
