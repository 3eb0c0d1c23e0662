//! Pipeline orchestration.
//!
//! Runs the phases strictly in order: reconnaissance, parsing, mapping,
//! synthesis, write, verification. All file modifications are staged in
//! memory and written only after every one of them has been computed,
//! so a failure in a later synthesis step never leaves the target
//! repository half-edited.

use crate::mapping::{MappingEngine, ScoringConfig, SelectorMapping};
use crate::parser::{ParsedScript, ScriptParser};
use crate::recon::{ReconReport, Reconnaissance};
use crate::result::ReformarResult;
use crate::synth::{apply_modification, CodeSynthesizer, GeneratedTestFile, PageObjectModification};
use crate::verify::{VerificationLoop, VerificationOutcome, DEFAULT_EXEC_TIMEOUT, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the target repository
    pub repo_root: PathBuf,
    /// Natural-language instruction the recording came from
    pub instruction: String,
    /// Compute everything, write and execute nothing
    pub dry_run: bool,
    /// Mapping-engine scoring knobs
    pub scoring: ScoringConfig,
    /// Verification retry budget
    pub max_retries: u32,
    /// Wall-clock budget per test-runner invocation
    pub exec_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            instruction: String::new(),
            dry_run: false,
            scoring: ScoringConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }
}

/// Final report of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether the generated test ultimately passed (always true for a
    /// dry run that reached the end)
    pub success: bool,
    /// Page-object files that were edited, as discovered during recon
    pub modified_files: Vec<PathBuf>,
    /// Path of the generated test file
    pub generated_file: Option<PathBuf>,
    /// Hard problems: skipped files, verification failure, wrapping
    pub errors: Vec<String>,
    /// Soft findings: applied fixes, static-check results
    pub warnings: Vec<String>,
}

/// Everything the pipeline has learned about one refactoring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Reconnaissance output
    pub recon: ReconReport,
    /// Parsed and clustered script
    pub script: ParsedScript,
    /// Selector ownership decisions
    pub mappings: Vec<SelectorMapping>,
    /// Staged page-object edits
    pub modifications: Vec<PageObjectModification>,
    /// The generated test file
    pub generated: GeneratedTestFile,
}

/// The five-phase refactoring pipeline
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from configuration
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the analysis phases only: recon, parse, map, synthesize.
    ///
    /// Touches nothing in the target repository.
    ///
    /// # Errors
    ///
    /// Returns an error when the repository root cannot be scanned.
    pub fn analyze(&self, raw_script: &str) -> ReformarResult<KnowledgeGraph> {
        info!(root = %self.config.repo_root.display(), "scanning repository");
        let recon = Reconnaissance::new().scan(&self.config.repo_root)?;
        info!(
            pages = recon.index.len(),
            fixtures = recon.fixtures.len(),
            "reconnaissance complete"
        );

        let script = ScriptParser::new().parse(raw_script);
        info!(
            tokens = script.tokens.len(),
            clusters = script.clusters.len(),
            "script parsed"
        );

        let engine = MappingEngine::new(self.config.scoring);
        let mappings = engine.map(&script.tokens, &recon.index);

        let synth = CodeSynthesizer::new(&recon);
        let modifications = synth.plan_modifications(&mappings, &script.clusters, &recon.index);
        let generated = synth.generate_test(
            &mappings,
            &script.clusters,
            &script.test_data,
            &self.config.instruction,
        );

        Ok(KnowledgeGraph {
            recon,
            script,
            mappings,
            modifications,
            generated,
        })
    }

    /// Run the full pipeline. Orchestration-level failures are folded
    /// into the report as a single error entry; this never panics and
    /// never returns `Err`.
    pub async fn run(&self, raw_script: &str) -> RunReport {
        match self.execute(raw_script).await {
            Ok(report) => report,
            Err(e) => RunReport {
                success: false,
                modified_files: Vec::new(),
                generated_file: None,
                errors: vec![format!("pipeline error: {e}")],
                warnings: Vec::new(),
            },
        }
    }

    async fn execute(&self, raw_script: &str) -> ReformarResult<RunReport> {
        let graph = self.analyze(raw_script)?;
        let mut errors = Vec::new();
        let mut warnings = check_generated(&graph.generated.content);
        let mut modified_files = Vec::new();

        if self.config.dry_run {
            info!("dry run; skipping writes and execution");
            return Ok(RunReport {
                success: true,
                modified_files,
                generated_file: Some(graph.generated.file_path),
                errors,
                warnings,
            });
        }

        // Write phase. Every modification was staged before any write.
        for modification in &graph.modifications {
            let absolute = self.config.repo_root.join(&modification.file_path);
            if !absolute.is_file() {
                warn!(path = %modification.file_path.display(), "target file missing; skipping");
                errors.push(format!(
                    "skipped modification of {}: file not found",
                    modification.file_path.display()
                ));
                continue;
            }
            let content = tokio::fs::read_to_string(&absolute).await?;
            tokio::fs::write(&absolute, apply_modification(&content, modification)).await?;
            modified_files.push(modification.file_path.clone());
        }

        let test_absolute = self.config.repo_root.join(&graph.generated.file_path);
        if let Some(parent) = test_absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&test_absolute, &graph.generated.content).await?;

        let outcome = VerificationLoop::new(self.config.max_retries, self.config.exec_timeout)
            .run(&self.config.repo_root, &graph.generated.file_path)
            .await?;
        report_outcome(&outcome, &mut errors, &mut warnings);

        Ok(RunReport {
            success: outcome.passed,
            modified_files,
            generated_file: Some(graph.generated.file_path),
            errors,
            warnings,
        })
    }
}

fn report_outcome(outcome: &VerificationOutcome, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    for fix in &outcome.fixes {
        warnings.push(format!("applied fix: {}", fix.description));
    }
    if !outcome.passed {
        let detail = outcome
            .diagnostic
            .as_deref()
            .map_or_else(String::new, |d| format!(": {}", d.lines().next().unwrap_or("")));
        errors.push(format!(
            "test failed after {} attempt(s){detail}",
            outcome.attempts
        ));
    }
}

/// Static well-formedness checks on generated test content. Each
/// finding becomes a warning, never a hard failure.
#[must_use]
pub fn check_generated(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    if !content.contains("import { test, expect }") {
        warnings.push("generated test is missing the framework import".to_string());
    }
    if !content.contains("test(") {
        warnings.push("generated test has no test declaration".to_string());
    }
    if !content.contains("expect(") {
        warnings.push("generated test contains no assertions".to_string());
    }
    if !content.contains("async (") {
        warnings.push("generated test handler is not async".to_string());
    }
    warnings
}
