//! Raw script parsing.
//!
//! Tokenizes a recorded automation script line by line through an
//! ordered table of statement rules, groups the resulting tokens into
//! semantic clusters with a single explicit fold, and extracts literal
//! test data. Unmatched lines are dropped silently: partial results
//! beat hard failures for recorder output.

use crate::locator::{LocatorDescriptor, LocatorGrammar};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keywords marking a locator as authentication-related
const AUTH_KEYWORDS: &[&str] = &[
    "login",
    "signin",
    "sign-in",
    "password",
    "username",
    "credential",
    "auth",
];

/// Keywords marking a locator as a menu-like container
const CONTAINER_KEYWORDS: &[&str] = &[
    "menu", "dropdown", "modal", "dialog", "drawer", "popover", "navigation", "select",
];

/// The operation a token performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// `page.goto(url)`
    Navigate,
    /// `page.waitForURL(pattern)`
    WaitForUrl,
    /// Click action
    Click,
    /// Fill action
    Fill,
    /// Type action
    Type,
    /// Check action
    Check,
    /// Uncheck action
    Uncheck,
    /// Key press action
    Press,
    /// Hover action
    Hover,
    /// Double-click action
    DblClick,
    /// Select-option action
    SelectOption,
    /// `expect(...)` assertion
    Assert,
    /// Any other recognized-shape verb, replayed as a pass-through
    Other,
}

impl OpKind {
    /// Map a surface verb to an operation kind
    #[must_use]
    pub fn from_verb(verb: &str) -> Self {
        match verb {
            "goto" => Self::Navigate,
            "waitForURL" => Self::WaitForUrl,
            "click" => Self::Click,
            "fill" => Self::Fill,
            "type" => Self::Type,
            "check" => Self::Check,
            "uncheck" => Self::Uncheck,
            "press" => Self::Press,
            "hover" => Self::Hover,
            "dblclick" => Self::DblClick,
            "selectOption" => Self::SelectOption,
            _ => Self::Other,
        }
    }
}

/// One parsed operation, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionToken {
    /// 1-based source line
    pub position: usize,
    /// Receiver: `page` or a stored-locator name
    pub actor: String,
    /// Operation kind
    pub op: OpKind,
    /// Surface verb (or assertion method) for rendering
    pub method: String,
    /// Element reference, when the operation targets one
    pub locator: Option<LocatorDescriptor>,
    /// Literal or identifier argument, when present
    pub value: Option<String>,
    /// Whether this token is an assertion
    pub is_assertion: bool,
}

/// Inferred intent of a contiguous token run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterKind {
    /// Opens with a navigation
    Navigation,
    /// Credential entry
    Authentication,
    /// Form fill-and-submit
    FormSubmission,
    /// Menu/dropdown interaction
    MenuInteraction,
    /// Assertion-only run
    Verification,
    /// Anything else
    Generic,
}

/// A contiguous run of tokens sharing an inferred intent.
///
/// Clusters partition the token sequence: no token is lost, duplicated,
/// or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCluster {
    /// Cluster type
    pub kind: ClusterKind,
    /// Tokens in source order
    pub tokens: Vec<ActionToken>,
    /// Indices into `tokens` of the assertion members
    pub assertions: Vec<usize>,
    /// Human-readable intent, computed when the cluster seals
    pub intent: String,
}

/// How a literal constant is used by the script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestDataUsage {
    /// Second argument of a fill/type call
    Fill,
    /// Referenced inside an assertion expression
    Assertion,
    /// Anything else
    Other,
}

/// A literal constant declared by the script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDataItem {
    /// Variable name
    pub variable: String,
    /// Literal value
    pub value: String,
    /// Usage classification
    pub usage: TestDataUsage,
}

/// Full parser output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedScript {
    /// Ordered tokens
    pub tokens: Vec<ActionToken>,
    /// Clusters partitioning the token sequence
    pub clusters: Vec<SemanticCluster>,
    /// Extracted literal constants
    pub test_data: Vec<TestDataItem>,
}

/// The statement shape a rule recognizes. The rule table is data: an
/// ordered list of `(pattern, shape)` evaluated top to bottom, so new
/// shapes are added without touching control flow.
#[derive(Debug, Clone, Copy)]
enum StatementShape {
    Navigate,
    WaitForUrl,
    Assertion,
    StoredLocator,
    ChainedAction,
    DirectAction,
    StoredAction,
}

#[derive(Debug)]
struct Rule {
    pattern: Regex,
    shape: StatementShape,
}

/// Script parser
#[derive(Debug)]
pub struct ScriptParser {
    grammar: LocatorGrammar,
    rules: Vec<Rule>,
    skip_line: Regex,
    fill_usage: Regex,
    assert_usage: Regex,
    data_decl: Regex,
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptParser {
    /// Compile the rule table
    #[must_use]
    pub fn new() -> Self {
        let rule = |pattern: &str, shape| Rule {
            pattern: Regex::new(pattern).expect("valid statement pattern"),
            shape,
        };
        Self {
            grammar: LocatorGrammar::new(),
            rules: vec![
                rule(
                    r#"^\s*(?:await\s+)?page\.goto\(\s*['"]([^'"]+)['"]"#,
                    StatementShape::Navigate,
                ),
                rule(
                    r#"^\s*(?:await\s+)?page\.waitForURL\(\s*['"]([^'"]+)['"]"#,
                    StatementShape::WaitForUrl,
                ),
                rule(
                    r#"^\s*(?:await\s+)?expect\((.+)\)\.(to[A-Za-z]+)\(\s*(?:['"]([^'"]*)['"]|([A-Za-z_][\w.]*))?\s*\)"#,
                    StatementShape::Assertion,
                ),
                rule(
                    r"^\s*(?:const|let|var)\s+([A-Za-z_]\w*)\s*=\s*page\.(?:getBy\w+|locator)\(",
                    StatementShape::StoredLocator,
                ),
                rule(
                    r#"^\s*(?:await\s+)?page\.(?:getBy\w+|locator)\(.*\)\.([a-z][A-Za-z]*)\(\s*(?:['"]([^'"]*)['"]|([A-Za-z_]\w*))?\s*\)"#,
                    StatementShape::ChainedAction,
                ),
                rule(
                    r#"^\s*(?:await\s+)?page\.(click|fill|type|check|uncheck|press|hover|dblclick|selectOption)\(\s*['"]([^'"]+)['"]\s*(?:,\s*(?:['"]([^'"]*)['"]|([A-Za-z_]\w*)))?\s*\)"#,
                    StatementShape::DirectAction,
                ),
                rule(
                    r#"^\s*(?:await\s+)?([A-Za-z_]\w*)\.([a-z][A-Za-z]*)\(\s*(?:['"]([^'"]*)['"]|([A-Za-z_]\w*))?\s*\)"#,
                    StatementShape::StoredAction,
                ),
            ],
            skip_line: Regex::new(r"^\s*(//|import\s|export\s|$)").expect("valid skip pattern"),
            fill_usage: Regex::new(r"\.(?:fill|type)\(\s*([A-Za-z_]\w*)\s*\)")
                .expect("valid fill-usage pattern"),
            assert_usage: Regex::new(r"expect\(.*\)").expect("valid assert-usage pattern"),
            data_decl: Regex::new(
                r#"^\s*(?:const|let|var)\s+([A-Za-z_]\w*)\s*=\s*['"]([^'"]*)['"]\s*;?\s*$"#,
            )
            .expect("valid data-decl pattern"),
        }
    }

    /// Parse raw script text into tokens, clusters, and test data
    #[must_use]
    pub fn parse(&self, raw: &str) -> ParsedScript {
        let tokens = self.tokenize(raw);
        let clusters = cluster(&tokens);
        let test_data = self.extract_test_data(raw);
        tracing::debug!(
            tokens = tokens.len(),
            clusters = clusters.len(),
            data = test_data.len(),
            "script parsed"
        );
        ParsedScript {
            tokens,
            clusters,
            test_data,
        }
    }

    /// Line-by-line tokenization through the rule table
    fn tokenize(&self, raw: &str) -> Vec<ActionToken> {
        let mut tokens = Vec::new();
        let mut stored: HashMap<String, LocatorDescriptor> = HashMap::new();

        for (i, line) in raw.lines().enumerate() {
            let position = i + 1;
            if self.skip_line.is_match(line) {
                continue;
            }
            let Some((rule, caps)) = self
                .rules
                .iter()
                .find_map(|rule| rule.pattern.captures(line).map(|caps| (rule, caps)))
            else {
                continue;
            };
            match rule.shape {
                StatementShape::Navigate => tokens.push(ActionToken {
                    position,
                    actor: "page".to_string(),
                    op: OpKind::Navigate,
                    method: "goto".to_string(),
                    locator: None,
                    value: Some(caps[1].to_string()),
                    is_assertion: false,
                }),
                StatementShape::WaitForUrl => tokens.push(ActionToken {
                    position,
                    actor: "page".to_string(),
                    op: OpKind::WaitForUrl,
                    method: "waitForURL".to_string(),
                    locator: None,
                    value: Some(caps[1].to_string()),
                    is_assertion: false,
                }),
                StatementShape::Assertion => {
                    let subject = caps[1].trim();
                    let locator = self.grammar.parse_constructor(subject).or_else(|| {
                        let name = subject.trim_start_matches("await ").trim();
                        stored.get(name).cloned()
                    });
                    tokens.push(ActionToken {
                        position,
                        actor: "page".to_string(),
                        op: OpKind::Assert,
                        method: caps[2].to_string(),
                        locator,
                        value: caps
                            .get(3)
                            .or_else(|| caps.get(4))
                            .map(|m| m.as_str().to_string()),
                        is_assertion: true,
                    });
                }
                StatementShape::StoredLocator => {
                    if let Some(descriptor) = self.grammar.parse_constructor(line) {
                        let _ = stored.insert(caps[1].to_string(), descriptor);
                    }
                }
                StatementShape::ChainedAction => {
                    let Some(locator) = self.grammar.parse_constructor(line) else {
                        continue;
                    };
                    let method = caps[1].to_string();
                    tokens.push(ActionToken {
                        position,
                        actor: "page".to_string(),
                        op: OpKind::from_verb(&method),
                        method,
                        locator: Some(locator),
                        value: caps
                            .get(2)
                            .or_else(|| caps.get(3))
                            .map(|m| m.as_str().to_string()),
                        is_assertion: false,
                    });
                }
                StatementShape::DirectAction => {
                    let method = caps[1].to_string();
                    tokens.push(ActionToken {
                        position,
                        actor: "page".to_string(),
                        op: OpKind::from_verb(&method),
                        method,
                        locator: Some(self.grammar.classify_literal(&caps[2])),
                        value: caps
                            .get(3)
                            .or_else(|| caps.get(4))
                            .map(|m| m.as_str().to_string()),
                        is_assertion: false,
                    });
                }
                StatementShape::StoredAction => {
                    let actor = caps[1].to_string();
                    // Only references to previously stored locators count;
                    // anything else is an unrecognized line.
                    let Some(descriptor) = stored.get(&actor).cloned() else {
                        continue;
                    };
                    let method = caps[2].to_string();
                    tokens.push(ActionToken {
                        position,
                        actor,
                        op: OpKind::from_verb(&method),
                        method,
                        locator: Some(descriptor),
                        value: caps
                            .get(3)
                            .or_else(|| caps.get(4))
                            .map(|m| m.as_str().to_string()),
                        is_assertion: false,
                    });
                }
            }
        }
        tokens
    }

    /// Extract literal constants and classify their use
    fn extract_test_data(&self, raw: &str) -> Vec<TestDataItem> {
        let mut items = Vec::new();
        for line in raw.lines() {
            let Some(caps) = self.data_decl.captures(line) else {
                continue;
            };
            let variable = caps[1].to_string();
            let value = caps[2].to_string();
            let usage = self.classify_usage(raw, &variable);
            items.push(TestDataItem {
                variable,
                value,
                usage,
            });
        }
        items
    }

    /// Scan the whole script for how a variable is consumed
    fn classify_usage(&self, raw: &str, variable: &str) -> TestDataUsage {
        for line in raw.lines() {
            if let Some(caps) = self.fill_usage.captures(line) {
                if &caps[1] == variable {
                    return TestDataUsage::Fill;
                }
            }
            if self.assert_usage.is_match(line) && line.contains(variable) {
                return TestDataUsage::Assertion;
            }
        }
        TestDataUsage::Other
    }
}

/// Fold state for clustering: the sealed clusters plus the one open run
#[derive(Debug, Default)]
struct ClusterAccumulator {
    done: Vec<SemanticCluster>,
    current: Option<OpenCluster>,
}

#[derive(Debug)]
struct OpenCluster {
    kind: ClusterKind,
    tokens: Vec<ActionToken>,
    assertions: Vec<usize>,
}

impl OpenCluster {
    fn new(kind: ClusterKind) -> Self {
        Self {
            kind,
            tokens: Vec::new(),
            assertions: Vec::new(),
        }
    }

    fn push(&mut self, token: ActionToken) {
        if token.is_assertion {
            self.assertions.push(self.tokens.len());
        }
        self.tokens.push(token);
    }

    /// Seal the cluster: assertion-only runs become verification, and
    /// the intent string is computed exactly once, here.
    fn seal(mut self) -> SemanticCluster {
        if self.kind == ClusterKind::Generic
            && !self.tokens.is_empty()
            && self.assertions.len() == self.tokens.len()
        {
            self.kind = ClusterKind::Verification;
        }
        let intent = intent_of(self.kind, &self.tokens);
        SemanticCluster {
            kind: self.kind,
            tokens: self.tokens,
            assertions: self.assertions,
            intent,
        }
    }
}

impl ClusterAccumulator {
    fn close(&mut self) {
        if let Some(open) = self.current.take() {
            if !open.tokens.is_empty() {
                self.done.push(open.seal());
            }
        }
    }

    fn open(&mut self, kind: ClusterKind) -> &mut OpenCluster {
        self.close();
        self.current.insert(OpenCluster::new(kind))
    }

    fn current_or(&mut self, kind: ClusterKind) -> &mut OpenCluster {
        self.current.get_or_insert_with(|| OpenCluster::new(kind))
    }
}

/// Group tokens into clusters with one left-to-right pass.
///
/// The ordered precedence rules follow the cluster-boundary contract:
/// navigation always breaks, assertions never break, authentication and
/// form entry continue their own cluster kinds, and a click chain on a
/// container locator re-marks the open cluster in place.
fn cluster(tokens: &[ActionToken]) -> Vec<SemanticCluster> {
    let mut acc = ClusterAccumulator::default();
    let mut prev: Option<&ActionToken> = None;

    for token in tokens {
        if token.op == OpKind::Navigate {
            acc.open(ClusterKind::Navigation).push(token.clone());
        } else if token.is_assertion {
            acc.current_or(ClusterKind::Generic).push(token.clone());
        } else if is_auth_token(token) {
            if acc.current.as_ref().is_some_and(|c| c.kind == ClusterKind::Authentication) {
                acc.current_or(ClusterKind::Authentication).push(token.clone());
            } else {
                acc.open(ClusterKind::Authentication).push(token.clone());
            }
        } else if token.op == OpKind::Click && prev.is_some_and(is_container_click) {
            let open = acc.current_or(ClusterKind::Generic);
            open.kind = ClusterKind::MenuInteraction;
            open.push(token.clone());
        } else if matches!(token.op, OpKind::Fill | OpKind::Type) {
            let continues = acc.current.as_ref().is_some_and(|c| {
                matches!(
                    c.kind,
                    ClusterKind::FormSubmission | ClusterKind::Authentication
                )
            });
            if continues {
                acc.current_or(ClusterKind::FormSubmission).push(token.clone());
            } else {
                acc.open(ClusterKind::FormSubmission).push(token.clone());
            }
        } else {
            acc.current_or(ClusterKind::Generic).push(token.clone());
        }
        prev = Some(token);
    }
    acc.close();
    acc.done
}

/// Whether a token's locator matches the authentication heuristic
fn is_auth_token(token: &ActionToken) -> bool {
    token.locator.as_ref().is_some_and(|locator| {
        let keywords = locator.keywords();
        AUTH_KEYWORDS.iter().any(|kw| keywords.contains(*kw))
    })
}

/// Whether a token is a click on a menu-like container
fn is_container_click(token: &ActionToken) -> bool {
    token.op == OpKind::Click
        && token.locator.as_ref().is_some_and(|locator| {
            let keywords = locator.keywords();
            CONTAINER_KEYWORDS.iter().any(|kw| keywords.contains(*kw))
        })
}

/// Short display label for a token's target
fn target_label(token: &ActionToken) -> String {
    token
        .locator
        .as_ref()
        .map(|l| l.name.clone().unwrap_or_else(|| l.value.clone()))
        .or_else(|| token.value.clone())
        .unwrap_or_else(|| "page".to_string())
}

/// Compute a cluster's human-readable intent from its kind and tokens
fn intent_of(kind: ClusterKind, tokens: &[ActionToken]) -> String {
    match kind {
        ClusterKind::Navigation => {
            let destination = tokens
                .first()
                .and_then(|t| t.value.clone())
                .unwrap_or_else(|| "page".to_string());
            format!("Navigate to {destination}")
        }
        ClusterKind::Authentication => "Sign in with credentials".to_string(),
        ClusterKind::FormSubmission => {
            let fields = tokens
                .iter()
                .filter(|t| matches!(t.op, OpKind::Fill | OpKind::Type))
                .count();
            format!("Fill and submit form ({fields} fields)")
        }
        ClusterKind::MenuInteraction => {
            let clicks: Vec<&ActionToken> =
                tokens.iter().filter(|t| t.op == OpKind::Click).collect();
            if clicks.len() >= 2 {
                format!(
                    "Open {} and choose {}",
                    target_label(clicks[0]),
                    target_label(clicks[clicks.len() - 1])
                )
            } else {
                "Interact with menu".to_string()
            }
        }
        ClusterKind::Verification => "Verify page state".to_string(),
        ClusterKind::Generic => "Perform page interactions".to_string(),
    }
}
