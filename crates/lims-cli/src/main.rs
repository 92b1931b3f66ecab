//! # lims CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lims_cli::available::{run_available, AvailableArgs};
use lims_cli::check::{run_check, CheckArgs};
use lims_cli::policy::{run_policy, PolicyArgs};
use lims_cli::tables::{run_tables, TablesArgs};

/// Laboratory lifecycle tables.
///
/// Prints the Sample, Test, Order and Invoice transition tables for review,
/// checks individual moves against them, and validates approval policies.
#[derive(Parser, Debug)]
#[command(name = "lims", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective transition tables, authored and derived rules.
    Tables(TablesArgs),

    /// Check one move; exits 2 when it is illegal or forbidden for the role.
    Check(CheckArgs),

    /// List the moves available from a status, optionally for one role.
    Available(AvailableArgs),

    /// Print the effective approval policy, validating a policy file if given.
    Policy(PolicyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Tables(args) => run_tables(&args),
        Commands::Check(args) => run_check(&args),
        Commands::Available(args) => run_available(&args),
        Commands::Policy(args) => run_policy(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
