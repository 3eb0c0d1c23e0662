//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reformador: CLI for Reformar - POM-aware refactoring of recorded browser tests
#[derive(Parser, Debug)]
#[command(name = "reformador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refactor a recorded script into the repository's POM conventions
    Refactor(RefactorArgs),

    /// Print what reconnaissance discovered about a repository
    Inspect(InspectArgs),
}

/// Arguments for the refactor command
#[derive(Parser, Debug)]
pub struct RefactorArgs {
    /// Target repository root
    #[arg(short, long)]
    pub repo: PathBuf,

    /// Recorded script file
    #[arg(short, long)]
    pub script: PathBuf,

    /// Natural-language instruction the recording came from
    #[arg(short, long)]
    pub instruction: String,

    /// Compute everything, write and execute nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Verification retry budget
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Per-invocation test-runner timeout in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    /// Emit the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Target repository root
    #[arg(short, long)]
    pub repo: PathBuf,

    /// Emit the recon report as JSON
    #[arg(long)]
    pub json: bool,
}
