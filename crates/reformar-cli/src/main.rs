//! Reformador CLI: refactor recorded browser scripts into POM code
//!
//! ## Usage
//!
//! ```bash
//! reformador refactor --repo ./app --script rec.txt \
//!     --instruction "log in and open settings"
//! reformador inspect --repo ./app       # Print the recon report
//! ```

use clap::Parser;
use reformador::{handlers, Cli, CliConfig, CliResult, Commands, Verbosity};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(config, cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: CliConfig, cli: Cli) -> CliResult<bool> {
    match cli.command {
        Commands::Refactor(args) => handlers::run_refactor(config, &args).await,
        Commands::Inspect(args) => {
            handlers::run_inspect(config, &args)?;
            Ok(true)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };
    CliConfig::new().with_verbosity(verbosity)
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
