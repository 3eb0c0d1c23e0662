//! Self-correcting verification loop.
//!
//! Runs the generated test out of process, classifies failures against
//! a fixed table of output signatures, applies a scoped repair for each
//! recognized failure, and retries up to a bounded number of attempts.
//! Repairs accumulate: a retry keeps every earlier fix.

use crate::result::{ReformarError, ReformarResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default number of run-classify-fix attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wall-clock budget for one test-runner invocation
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(120);

/// Overlay class known to swallow pointer events during page loads
const LOADING_OVERLAY: &str = ".loading-overlay";

/// Diagnostics kept on an unfixable outcome are capped at this length
const DIAGNOSTIC_LIMIT: usize = 2000;

/// Classified failure from test-runner output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Timed out waiting for an element to appear
    ElementNotFound {
        /// Locator expression the runner was waiting on
        locator: String,
    },
    /// Another element intercepted the pointer event
    ElementIntercepted {
        /// Whether the known loading overlay was the interceptor
        overlay_hit: bool,
    },
    /// Element handle went stale between query and action
    StaleElement,
    /// An `expect(...)` assertion failed
    AssertionFailed {
        /// Locator text captured from the failing assertion, if any
        locator: Option<String>,
    },
    /// A timeout with no recognizable waiting target
    GenericTimeout,
    /// Output matched no known signature
    Unknown,
}

/// A repair applied to the generated test between attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAction {
    /// Failure that prompted the fix
    pub kind: FailureKind,
    /// One-line description of the edit
    pub description: String,
}

/// Result of running the loop to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Whether the test ultimately passed
    pub passed: bool,
    /// Number of attempts consumed
    pub attempts: u32,
    /// Fixes applied across all attempts, in order
    pub fixes: Vec<FixAction>,
    /// Truncated runner output from the final failing attempt
    pub diagnostic: Option<String>,
}

/// One raw test-runner invocation
#[derive(Debug, Clone)]
struct RunResult {
    passed: bool,
    output: String,
}

/// Ordered signature table entry
struct Signature {
    pattern: Regex,
    classify: fn(&regex::Captures<'_>) -> FailureKind,
}

/// Run-classify-fix loop around the repository's test runner
#[derive(Debug)]
pub struct VerificationLoop {
    max_retries: u32,
    timeout: Duration,
}

impl Default for VerificationLoop {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_EXEC_TIMEOUT)
    }
}

impl VerificationLoop {
    /// Create a loop with explicit retry and timeout bounds
    #[must_use]
    pub fn new(max_retries: u32, timeout: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            timeout,
        }
    }

    /// Run the test at `test_path` (relative to `repo_root`) until it
    /// passes, becomes unfixable, or the retry budget is exhausted.
    ///
    /// Rewrites the test file in place between attempts.
    ///
    /// # Errors
    ///
    /// Returns an error when the runner cannot be spawned, a single
    /// invocation exceeds the timeout, or the test file cannot be
    /// read or rewritten.
    pub async fn run(
        &self,
        repo_root: &Path,
        test_path: &Path,
    ) -> ReformarResult<VerificationOutcome> {
        let mut fixes = Vec::new();
        let mut last_output = None;

        for attempt in 1..=self.max_retries {
            info!(attempt, max = self.max_retries, "running test");
            let result = self.run_once(repo_root, test_path).await?;
            if result.passed {
                info!(attempt, "test passed");
                return Ok(VerificationOutcome {
                    passed: true,
                    attempts: attempt,
                    fixes,
                    diagnostic: None,
                });
            }

            let kind = classify_failure(&result.output);
            warn!(attempt, ?kind, "test failed");
            last_output = Some(result.output);

            if kind == FailureKind::Unknown || attempt == self.max_retries {
                break;
            }

            let absolute = repo_root.join(test_path);
            let content = tokio::fs::read_to_string(&absolute).await?;
            let (repaired, fix) = apply_fix(&content, &kind);
            debug!(fix = %fix.description, "applying fix");
            tokio::fs::write(&absolute, repaired).await?;
            fixes.push(fix);
        }

        Ok(VerificationOutcome {
            passed: false,
            attempts: self.max_retries.min(fixes.len() as u32 + 1),
            fixes,
            diagnostic: last_output.map(|o| truncate(&o, DIAGNOSTIC_LIMIT)),
        })
    }

    /// Spawn one `npx playwright test` invocation under the timeout
    async fn run_once(&self, repo_root: &Path, test_path: &Path) -> ReformarResult<RunResult> {
        let mut child = Command::new("npx")
            .arg("playwright")
            .arg("test")
            .arg(test_path)
            .current_dir(repo_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReformarError::execution(format!("failed to spawn npx: {e}")))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let waited = tokio::time::timeout(self.timeout, async {
            use tokio::io::AsyncReadExt;
            let mut stdout = String::new();
            let mut stderr = String::new();
            // drain both pipes together so neither can fill up and
            // stall the child
            let (out_read, err_read) = tokio::join!(
                async {
                    match stdout_pipe {
                        Some(mut pipe) => pipe.read_to_string(&mut stdout).await.map(|_| ()),
                        None => Ok(()),
                    }
                },
                async {
                    match stderr_pipe {
                        Some(mut pipe) => pipe.read_to_string(&mut stderr).await.map(|_| ()),
                        None => Ok(()),
                    }
                }
            );
            out_read?;
            err_read?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match waited {
            Ok(Ok((status, stdout, stderr))) => Ok(RunResult {
                passed: status.success(),
                output: format!("{stdout}\n{stderr}"),
            }),
            Ok(Err(e)) => Err(ReformarError::execution(format!(
                "failed to collect runner output: {e}"
            ))),
            Err(_) => {
                child.start_kill().ok();
                Err(ReformarError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Build the ordered signature table. More specific signatures first;
/// the first match wins.
fn signatures() -> Vec<Signature> {
    // Patterns are fixed string literals; compilation cannot fail.
    vec![
        Signature {
            pattern: Regex::new(
                r"Timeout \d+ms exceeded[\s\S]*?waiting for (locator\([^)]*\)|getBy\w+\([^)]*\))",
            )
            .expect("element-not-found signature"),
            classify: |caps| FailureKind::ElementNotFound {
                locator: caps[1].to_string(),
            },
        },
        Signature {
            pattern: Regex::new(r"<([^>]+)>[^\n]*intercepts pointer events")
                .expect("intercepted signature"),
            classify: |caps| FailureKind::ElementIntercepted {
                overlay_hit: caps[1].contains("loading-overlay"),
            },
        },
        Signature {
            pattern: Regex::new(r"[Ee]lement is not attached to the DOM")
                .expect("stale signature"),
            classify: |_| FailureKind::StaleElement,
        },
        Signature {
            pattern: Regex::new(r"expect\(([^)]*)\)[\s\S]{0,200}?(?:failed|Received)")
                .expect("assertion signature"),
            classify: |caps| {
                let text = caps[1].trim();
                FailureKind::AssertionFailed {
                    locator: (!text.is_empty()).then(|| text.to_string()),
                }
            },
        },
        Signature {
            pattern: Regex::new(r"Timeout \d+ms exceeded").expect("generic-timeout signature"),
            classify: |_| FailureKind::GenericTimeout,
        },
    ]
}

/// Classify runner output against the signature table
#[must_use]
pub fn classify_failure(output: &str) -> FailureKind {
    for signature in signatures() {
        if let Some(caps) = signature.pattern.captures(output) {
            return (signature.classify)(&caps);
        }
    }
    FailureKind::Unknown
}

/// Apply the repair for one classified failure.
///
/// Edits are scoped to the failing statement: the first statement whose
/// text contains the implicated locator. Never a file-wide replace.
#[must_use]
pub fn apply_fix(content: &str, kind: &FailureKind) -> (String, FixAction) {
    match kind {
        FailureKind::ElementNotFound { locator } => {
            let wait = format!("await {locator}.waitFor({{ state: 'visible' }});");
            match insert_before_statement(content, locator, &wait) {
                Some(repaired) => (
                    repaired,
                    fix_action(kind, format!("wait for {locator} to become visible")),
                ),
                None => (
                    insert_after_first_action(content, "await page.waitForLoadState('networkidle');"),
                    fix_action(kind, "wait for network idle".to_string()),
                ),
            }
        }
        FailureKind::ElementIntercepted { overlay_hit } => {
            if *overlay_hit {
                let wait = format!(
                    "await page.locator('{LOADING_OVERLAY}').waitFor({{ state: 'hidden' }});"
                );
                (
                    insert_after_first_action(content, &wait),
                    fix_action(kind, "wait for loading overlay to clear".to_string()),
                )
            } else {
                (
                    force_first_click(content),
                    fix_action(kind, "force the intercepted click".to_string()),
                )
            }
        }
        FailureKind::StaleElement => (
            insert_after_first_action(
                content,
                "// re-query: previous handle went stale after navigation",
            ),
            fix_action(kind, "flag stale element for re-query".to_string()),
        ),
        FailureKind::AssertionFailed { locator } => {
            let repaired = locator
                .as_deref()
                .and_then(|l| poll_assertion(content, l))
                .unwrap_or_else(|| content.to_string());
            (
                repaired,
                fix_action(kind, "retry assertion with a 10s poll".to_string()),
            )
        }
        FailureKind::GenericTimeout => (
            insert_after_first_action(
                content,
                "// timeout observed here on a prior run; page may load slowly",
            ),
            fix_action(kind, "note slow page load".to_string()),
        ),
        FailureKind::Unknown => (
            content.to_string(),
            fix_action(kind, "no repair for unrecognized failure".to_string()),
        ),
    }
}

fn fix_action(kind: &FailureKind, description: String) -> FixAction {
    FixAction {
        kind: kind.clone(),
        description,
    }
}

/// Insert `addition` immediately before the first statement containing
/// `needle`, matching its indentation. Returns `None` when no statement
/// matches.
fn insert_before_statement(content: &str, needle: &str, addition: &str) -> Option<String> {
    let target = content
        .lines()
        .position(|line| line.contains(needle) && !line.contains(addition))?;
    let indent: String = content
        .lines()
        .nth(target)
        .unwrap_or("")
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if i == target {
            out.push(format!("{indent}{addition}"));
        }
        out.push(line.to_string());
    }
    Some(finish(content, out))
}

/// Insert `addition` after the first `await` statement in the test body
fn insert_after_first_action(content: &str, addition: &str) -> String {
    let mut out = Vec::new();
    let mut inserted = false;
    for line in content.lines() {
        out.push(line.to_string());
        if !inserted && line.trim_start().starts_with("await ") {
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            out.push(format!("{indent}{addition}"));
            inserted = true;
        }
    }
    finish(content, out)
}

/// Rewrite the first `.click()` into `.click({ force: true })`
fn force_first_click(content: &str) -> String {
    let mut out = Vec::new();
    let mut rewritten = false;
    for line in content.lines() {
        if !rewritten && line.contains(".click()") {
            out.push(line.replacen(".click()", ".click({ force: true })", 1));
            rewritten = true;
        } else {
            out.push(line.to_string());
        }
    }
    finish(content, out)
}

/// Rewrite the failing assertion into an `expect.poll` with a fixed
/// timeout. Only the statement containing `locator_text` changes.
fn poll_assertion(content: &str, locator_text: &str) -> Option<String> {
    let target = content
        .lines()
        .position(|line| line.contains("expect(") && line.contains(locator_text))?;
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if i == target {
            let trimmed = line.trim_start();
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            let inner = trimmed
                .strip_prefix("await ")
                .unwrap_or(trimmed)
                .trim_end_matches(';');
            out.push(format!(
                "{indent}await expect.poll(async () => {{ return {inner}; }}, {{ timeout: 10000 }});"
            ));
        } else {
            out.push(line.to_string());
        }
    }
    Some(finish(content, out))
}

fn finish(original: &str, lines: Vec<String>) -> String {
    let mut result = lines.join("\n");
    if original.ends_with('\n') {
        result.push('\n');
    }
    result
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}
