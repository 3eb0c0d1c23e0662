//! Subcommand handlers

use crate::commands::{InspectArgs, RefactorArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use reformar::{Pipeline, PipelineConfig, Reconnaissance, ScoringConfig};
use std::time::Duration;
use tracing::info;

/// Run the refactor pipeline. Returns whether the run succeeded.
pub async fn run_refactor(config: CliConfig, args: &RefactorArgs) -> CliResult<bool> {
    let raw_script = std::fs::read_to_string(&args.script)?;
    if raw_script.trim().is_empty() {
        return Err(CliError::invalid_argument(format!(
            "script file is empty: {}",
            args.script.display()
        )));
    }

    info!(repo = %args.repo.display(), dry_run = args.dry_run, "starting pipeline");
    let pipeline = Pipeline::new(PipelineConfig {
        repo_root: args.repo.clone(),
        instruction: args.instruction.clone(),
        dry_run: args.dry_run,
        scoring: ScoringConfig::default(),
        max_retries: args.max_retries,
        exec_timeout: Duration::from_secs(args.timeout_secs),
    });
    let report = pipeline.run(&raw_script).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        Reporter::new(config.verbosity.is_quiet()).render_run_report(&report);
    }
    Ok(report.success)
}

/// Print the reconnaissance report for a repository
pub fn run_inspect(config: CliConfig, args: &InspectArgs) -> CliResult<()> {
    let report = Reconnaissance::new().scan(&args.repo)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        Reporter::new(config.verbosity.is_quiet()).render_recon_report(&report);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::RefactorArgs;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_empty_script_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("rec.txt");
        std::fs::write(&script, "  \n").unwrap();
        let args = RefactorArgs {
            repo: dir.path().to_path_buf(),
            script,
            instruction: "x".to_string(),
            dry_run: true,
            max_retries: 3,
            timeout_secs: 120,
            json: false,
        };
        let result = run_refactor(CliConfig::new(), &args).await;
        assert!(matches!(result, Err(CliError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_missing_script_is_io_error() {
        let args = RefactorArgs {
            repo: PathBuf::from("."),
            script: PathBuf::from("/nonexistent/rec.txt"),
            instruction: "x".to_string(),
            dry_run: true,
            max_retries: 3,
            timeout_secs: 120,
            json: false,
        };
        let result = run_refactor(CliConfig::new(), &args).await;
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn test_inspect_missing_repo_fails() {
        let args = InspectArgs {
            repo: PathBuf::from("/nonexistent/repo"),
            json: false,
        };
        assert!(run_inspect(CliConfig::new(), &args).is_err());
    }
}
