//! Reformador CLI Library
//!
//! Command-line interface for the Reformar refactoring pipeline.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod commands;
mod config;
mod error;
mod output;

/// Subcommand handlers
pub mod handlers;

pub use commands::{Cli, Commands, InspectArgs, RefactorArgs};
pub use config::{CliConfig, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Reporter;
