//! Style-matched code synthesis.
//!
//! Renders new page-object properties and methods in the detected
//! repository style, generates the fixture-driven test file, and
//! applies staged modifications as pure text splices. Nothing here
//! touches disk: the orchestrator stages everything in memory first and
//! writes only after all modifications are computed.

use crate::locator::{lower_camel, split_words};
use crate::mapping::SelectorMapping;
use crate::parser::{ActionToken, ClusterKind, OpKind, SemanticCluster, TestDataItem};
use crate::recon::{DeclarationStyle, PageObjectIndex, ReconReport, StyleProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Insertion offset used when a class body is otherwise empty
const EMPTY_CLASS_INSERTION_LINE: usize = 2;

/// Maximum length of a slugified test-file stem
const SLUG_LIMIT: usize = 50;

/// A staged edit to an existing page-object source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageObjectModification {
    /// Target source file
    pub file_path: PathBuf,
    /// Class receiving the new members
    pub class_name: String,
    /// Rendered property declaration lines
    pub new_property_lines: Vec<String>,
    /// Rendered method lines
    pub new_method_lines: Vec<String>,
    /// 1-based line after which the block is spliced in
    pub insertion_line: usize,
}

/// The generated test source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTestFile {
    /// Destination path under the test directory
    pub file_path: PathBuf,
    /// Full file content
    pub content: String,
    /// Fixture names the test destructures
    pub required_fixtures: Vec<String>,
    /// Import lines at the top of the file
    pub import_lines: Vec<String>,
}

/// Style-matched source generator
#[derive(Debug, Clone)]
pub struct CodeSynthesizer {
    style: StyleProfile,
    report: ReconReport,
}

impl CodeSynthesizer {
    /// Create a synthesizer bound to one reconnaissance report
    #[must_use]
    pub fn new(report: &ReconReport) -> Self {
        Self {
            style: report.style.clone(),
            report: report.clone(),
        }
    }

    /// Stage one modification per target class that needs new members.
    ///
    /// Menu-interaction clusters whose tokens map entirely into a
    /// single class additionally get one replay method each.
    #[must_use]
    pub fn plan_modifications(
        &self,
        mappings: &[SelectorMapping],
        clusters: &[SemanticCluster],
        index: &PageObjectIndex,
    ) -> Vec<PageObjectModification> {
        let mut by_class: BTreeMap<String, Vec<&SelectorMapping>> = BTreeMap::new();
        for mapping in mappings.iter().filter(|m| m.is_new_property) {
            by_class
                .entry(mapping.target_class.clone())
                .or_default()
                .push(mapping);
        }

        let ownership = ownership_table(mappings);
        by_class
            .into_iter()
            .map(|(class_name, group)| {
                let record = index.get(&class_name);
                let file_path = record.map_or_else(
                    || self.proposed_page_path(&class_name),
                    |r| r.file_path.clone(),
                );
                let insertion_line = record.map_or(EMPTY_CLASS_INSERTION_LINE, |r| {
                    r.locators.last().map(|entry| entry.line).unwrap_or_else(|| {
                        r.methods
                            .first()
                            .map_or(EMPTY_CLASS_INSERTION_LINE, |m| m.line.saturating_sub(1))
                    })
                });
                let new_property_lines = group
                    .iter()
                    .map(|mapping| self.render_property(mapping))
                    .collect();
                let new_method_lines = clusters
                    .iter()
                    .filter(|cluster| cluster.kind == ClusterKind::MenuInteraction)
                    .filter(|cluster| cluster_owned_by(cluster, &class_name, &ownership))
                    .flat_map(|cluster| self.render_method(cluster, &ownership))
                    .collect();
                PageObjectModification {
                    file_path,
                    class_name,
                    new_property_lines,
                    new_method_lines,
                    insertion_line,
                }
            })
            .collect()
    }

    /// Render one property declaration in the detected style
    fn render_property(&self, mapping: &SelectorMapping) -> String {
        let locator = mapping.selector.render_rooted("this.page");
        let property = &mapping.target_property;
        match &self.style.declaration {
            DeclarationStyle::Getter => {
                format!("  get {property}() {{ return {locator}; }}")
            }
            DeclarationStyle::Wrapper { class_name } => {
                let label = display_label(property);
                format!(
                    "  {}{property} = new {class_name}({locator}, '{label}');",
                    self.visibility_prefix()
                )
            }
            DeclarationStyle::Native => {
                format!("  {}{property} = {locator};", self.visibility_prefix())
            }
        }
    }

    /// Render a replay method for a menu-interaction cluster
    fn render_method(
        &self,
        cluster: &SemanticCluster,
        ownership: &HashMap<String, (String, String)>,
    ) -> Vec<String> {
        let name = method_name(&cluster.intent);
        let mut lines = vec![format!("  async {name}() {{")];
        for token in cluster.tokens.iter().filter(|t| !t.is_assertion) {
            let Some(property) = token
                .locator
                .as_ref()
                .and_then(|l| ownership.get(&l.matching_key()))
                .map(|(_, property)| property.clone())
            else {
                continue;
            };
            let receiver = format!("this.{property}");
            let statement = match token.op {
                OpKind::Click => format!("await {receiver}.click();"),
                OpKind::Fill | OpKind::Type => format!(
                    "await {receiver}.{}('{}');",
                    token.method,
                    token.value.as_deref().unwrap_or("")
                ),
                OpKind::Hover => format!("await {receiver}.hover();"),
                // Anything else replays as a direct pass-through call.
                _ => format!("await {receiver}.{}();", token.method),
            };
            lines.push(format!("    {statement}"));
        }
        lines.push("  }".to_string());
        lines
    }

    /// Generate the test file for the whole parsed script
    #[must_use]
    pub fn generate_test(
        &self,
        mappings: &[SelectorMapping],
        clusters: &[SemanticCluster],
        test_data: &[TestDataItem],
        instruction: &str,
    ) -> GeneratedTestFile {
        let ownership = ownership_table(mappings);
        let required_fixtures = self.required_fixtures(mappings);
        let import_lines = self.import_lines();

        let mut body = String::new();
        for line in &import_lines {
            body.push_str(line);
            body.push('\n');
        }
        body.push('\n');
        body.push_str(&format!(
            "test('{}', async ({{ {} }}) => {{\n",
            escape_single_quotes(instruction),
            required_fixtures.join(", ")
        ));
        body.push_str("  const email = process.env.TEST_EMAIL ?? 'test@example.com';\n");
        body.push_str("  const password = process.env.TEST_PASSWORD ?? 'Password123!';\n");

        for cluster in clusters {
            body.push('\n');
            body.push_str(&format!("  // {}\n", cluster.intent));
            for token in &cluster.tokens {
                body.push_str(&format!(
                    "  {}\n",
                    self.render_statement(token, &ownership, test_data)
                ));
            }
        }
        body.push_str("});\n");

        GeneratedTestFile {
            file_path: self.test_file_path(instruction),
            content: body,
            required_fixtures,
            import_lines,
        }
    }

    /// Render one test statement. Navigation and assertions run against
    /// the page; everything else goes through the owning fixture.
    fn render_statement(
        &self,
        token: &ActionToken,
        ownership: &HashMap<String, (String, String)>,
        test_data: &[TestDataItem],
    ) -> String {
        match token.op {
            OpKind::Navigate | OpKind::WaitForUrl => format!(
                "await page.{}('{}');",
                token.method,
                token.value.as_deref().unwrap_or("/")
            ),
            OpKind::Assert => {
                let subject = token
                    .locator
                    .as_ref()
                    .map_or_else(|| "page".to_string(), |l| l.render());
                match &token.value {
                    Some(value) => format!(
                        "await expect({subject}).{}({});",
                        token.method,
                        render_value(value, test_data)
                    ),
                    None => format!("await expect({subject}).{}();", token.method),
                }
            }
            _ => {
                let receiver = token
                    .locator
                    .as_ref()
                    .and_then(|l| ownership.get(&l.matching_key()))
                    .map_or_else(
                        || {
                            token
                                .locator
                                .as_ref()
                                .map_or_else(|| "page".to_string(), |l| l.render())
                        },
                        |(class, property)| {
                            format!("{}.{property}", self.fixture_name(class))
                        },
                    );
                match &token.value {
                    Some(value) => format!(
                        "await {receiver}.{}({});",
                        token.method,
                        render_value(value, test_data)
                    ),
                    None => format!("await {receiver}.{}();", token.method),
                }
            }
        }
    }

    /// Fixture names the test must request, `page` first
    fn required_fixtures(&self, mappings: &[SelectorMapping]) -> Vec<String> {
        let mut fixtures = vec!["page".to_string()];
        for mapping in mappings {
            let fixture = self.fixture_name(&mapping.target_class);
            if !fixtures.contains(&fixture) {
                fixtures.push(fixture);
            }
        }
        fixtures
    }

    /// Resolve a class to its fixture name, falling back to the
    /// lower-camel form of the class name
    fn fixture_name(&self, class_name: &str) -> String {
        self.report
            .fixtures
            .fixture_for_class(class_name)
            .map_or_else(|| lower_camel(&split_words(class_name)), String::from)
    }

    fn import_lines(&self) -> Vec<String> {
        if self.report.fixtures.is_empty() {
            vec!["import { test, expect } from '@playwright/test';".to_string()]
        } else {
            let dir_name = self
                .report
                .context
                .page_object_dir
                .as_deref()
                .and_then(|d| d.file_name())
                .map_or_else(|| "pages".to_string(), |n| n.to_string_lossy().to_string());
            let stem = self
                .report
                .context
                .fixture_file
                .as_deref()
                .and_then(|f| f.file_stem())
                .map_or_else(
                    || "fixtures".to_string(),
                    |n| n.to_string_lossy().to_string(),
                );
            vec![format!("import {{ test, expect }} from '../{dir_name}/{stem}';")]
        }
    }

    /// Destination for the generated test file: slugified instruction
    /// under the discovered test directory
    fn test_file_path(&self, instruction: &str) -> PathBuf {
        let dir = self
            .report
            .context
            .test_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("tests"));
        dir.join(format!("{}.spec.ts", slugify(instruction)))
    }

    /// Proposed path for a page object that does not exist yet
    fn proposed_page_path(&self, class_name: &str) -> PathBuf {
        let dir = self
            .report
            .context
            .page_object_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("pages"));
        dir.join(format!("{}.page.ts", split_words(class_name).join("-")))
    }

    fn visibility_prefix(&self) -> String {
        self.style
            .visibility
            .as_deref()
            .map_or_else(String::new, |vis| format!("{vis} "))
    }
}

/// Apply a staged modification to file content as a pure text splice:
/// skip blank lines forward from the insertion point, then insert the
/// labeled property block followed by the labeled method block.
#[must_use]
pub fn apply_modification(content: &str, modification: &PageObjectModification) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut insert_at = modification.insertion_line.min(lines.len());
    while insert_at < lines.len() && lines[insert_at].trim().is_empty() {
        insert_at += 1;
    }

    let mut block: Vec<String> = Vec::new();
    if !modification.new_property_lines.is_empty() {
        block.push(String::new());
        block.push("  // New locators".to_string());
        block.extend(modification.new_property_lines.iter().cloned());
    }
    if !modification.new_method_lines.is_empty() {
        block.push(String::new());
        block.push("  // New methods".to_string());
        block.extend(modification.new_method_lines.iter().cloned());
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + block.len());
    out.extend(lines[..insert_at].iter().map(|s| (*s).to_string()));
    out.extend(block);
    out.extend(lines[insert_at..].iter().map(|s| (*s).to_string()));
    let mut result = out.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// selector key → (owning class, property) for every mapping
fn ownership_table(mappings: &[SelectorMapping]) -> HashMap<String, (String, String)> {
    mappings
        .iter()
        .map(|m| {
            (
                m.selector.matching_key(),
                (m.target_class.clone(), m.target_property.clone()),
            )
        })
        .collect()
}

/// Whether every locator-bearing token of a cluster maps into `class`
fn cluster_owned_by(
    cluster: &SemanticCluster,
    class: &str,
    ownership: &HashMap<String, (String, String)>,
) -> bool {
    let mut saw_locator = false;
    for token in &cluster.tokens {
        if let Some(locator) = &token.locator {
            saw_locator = true;
            match ownership.get(&locator.matching_key()) {
                Some((owner, _)) if owner == class => {}
                _ => return false,
            }
        }
    }
    saw_locator
}

/// Lower-camel method name derived from a cluster intent
fn method_name(intent: &str) -> String {
    let mut words = split_words(intent);
    words.truncate(6);
    if words.is_empty() {
        words.push("interact".to_string());
    }
    lower_camel(&words)
}

/// Human-readable label for wrapper-class construction
fn display_label(property: &str) -> String {
    let words = split_words(property);
    let mut label = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            label.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            label.extend(first.to_uppercase());
            label.push_str(chars.as_str());
        }
    }
    label
}

/// Render a fill/assertion argument: known test-data variables stay
/// identifiers, everything else becomes a quoted literal
fn render_value(value: &str, test_data: &[TestDataItem]) -> String {
    let is_known_var = value == "email"
        || value == "password"
        || test_data.iter().any(|item| item.variable == value);
    if is_known_var {
        value.to_string()
    } else {
        format!("'{}'", escape_single_quotes(value))
    }
}

fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "\\'")
}

/// Slugify an instruction into a bounded file-name stem
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= SLUG_LIMIT {
            break;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "generated-test".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::{LocatorDescriptor, SelectorKind};
    use crate::mapping::{MappingEngine, UNKNOWN_PAGE_CLASS};
    use crate::parser::ScriptParser;
    use crate::recon::{
        FixtureEntry, FixtureRegistry, LocatorEntry, PageObjectRecord, RepositoryContext,
    };
    use std::path::Path;

    fn report_with_login_page() -> ReconReport {
        let mut report = ReconReport::default();
        report.context = RepositoryContext {
            page_object_dir: Some(PathBuf::from("pages")),
            test_dir: Some(PathBuf::from("tests")),
            ..RepositoryContext::default()
        };
        report.style.visibility = Some("readonly".to_string());
        let mut fixtures = FixtureRegistry::new();
        fixtures.insert_if_absent(
            "loginPage",
            FixtureEntry {
                class_name: "LoginPage".to_string(),
                instantiation: "new LoginPage(page)".to_string(),
            },
        );
        report.fixtures = fixtures;
        report.index.insert(PageObjectRecord {
            class_name: "LoginPage".to_string(),
            file_path: PathBuf::from("pages/login.page.ts"),
            base_class: None,
            locators: vec![LocatorEntry {
                property: "signInBtn".to_string(),
                descriptor: LocatorDescriptor::new(SelectorKind::TestId, "sign-in-button"),
                line: 5,
            }],
            methods: Vec::new(),
        });
        report
    }

    fn mapping(selector: LocatorDescriptor, class: &str, property: &str) -> SelectorMapping {
        SelectorMapping {
            selector,
            target_class: class.to_string(),
            target_property: property.to_string(),
            is_new_property: true,
            confidence: 0.7,
            reasoning: String::new(),
        }
    }

    mod property_rendering_tests {
        use super::*;

        #[test]
        fn test_native_property() {
            let report = report_with_login_page();
            let synth = CodeSynthesizer::new(&report);
            let m = mapping(
                LocatorDescriptor::new(SelectorKind::Label, "Email"),
                "LoginPage",
                "emailField",
            );
            let mods = synth.plan_modifications(&[m], &[], &report.index);
            assert_eq!(mods.len(), 1);
            assert_eq!(
                mods[0].new_property_lines[0],
                "  readonly emailField = this.page.getByLabel('Email');"
            );
            // after the last existing locator
            assert_eq!(mods[0].insertion_line, 5);
        }

        #[test]
        fn test_getter_property() {
            let mut report = report_with_login_page();
            report.style.declaration = DeclarationStyle::Getter;
            let synth = CodeSynthesizer::new(&report);
            let m = mapping(
                LocatorDescriptor::new(SelectorKind::TestId, "save"),
                "LoginPage",
                "saveButton",
            );
            let mods = synth.plan_modifications(&[m], &[], &report.index);
            assert_eq!(
                mods[0].new_property_lines[0],
                "  get saveButton() { return this.page.getByTestId('save'); }"
            );
        }

        #[test]
        fn test_wrapper_property() {
            let mut report = report_with_login_page();
            report.style.declaration = DeclarationStyle::Wrapper {
                class_name: "Button".to_string(),
            };
            let synth = CodeSynthesizer::new(&report);
            let m = mapping(
                LocatorDescriptor::new(SelectorKind::TestId, "save"),
                "LoginPage",
                "saveButton",
            );
            let mods = synth.plan_modifications(&[m], &[], &report.index);
            assert_eq!(
                mods[0].new_property_lines[0],
                "  readonly saveButton = new Button(this.page.getByTestId('save'), 'Save Button');"
            );
        }

        #[test]
        fn test_unknown_class_gets_proposed_path() {
            let report = ReconReport::default();
            let synth = CodeSynthesizer::new(&report);
            let m = mapping(
                LocatorDescriptor::new(SelectorKind::TestId, "save"),
                UNKNOWN_PAGE_CLASS,
                "saveButton",
            );
            let mods = synth.plan_modifications(&[m], &[], &report.index);
            assert_eq!(mods[0].file_path, Path::new("pages/unknown-page.page.ts"));
            assert_eq!(mods[0].insertion_line, EMPTY_CLASS_INSERTION_LINE);
        }
    }

    mod method_rendering_tests {
        use super::*;

        #[test]
        fn test_menu_cluster_becomes_method() {
            let report = report_with_login_page();
            let synth = CodeSynthesizer::new(&report);
            let parsed = ScriptParser::new().parse(
                "await page.getByTestId('user-menu').click();\nawait page.getByText('Settings').click();\n",
            );
            let mappings = vec![
                mapping(
                    parsed.tokens[0].locator.clone().unwrap(),
                    "LoginPage",
                    "userMenu",
                ),
                mapping(
                    parsed.tokens[1].locator.clone().unwrap(),
                    "LoginPage",
                    "settingsItem",
                ),
            ];
            let mods = synth.plan_modifications(&mappings, &parsed.clusters, &report.index);
            let methods = mods[0].new_method_lines.join("\n");
            assert!(methods.contains("async open"));
            assert!(methods.contains("await this.userMenu.click();"));
            assert!(methods.contains("await this.settingsItem.click();"));
        }

        #[test]
        fn test_split_ownership_gets_no_method() {
            let report = report_with_login_page();
            let synth = CodeSynthesizer::new(&report);
            let parsed = ScriptParser::new().parse(
                "await page.getByTestId('user-menu').click();\nawait page.getByText('Settings').click();\n",
            );
            let mappings = vec![
                mapping(
                    parsed.tokens[0].locator.clone().unwrap(),
                    "LoginPage",
                    "userMenu",
                ),
                mapping(
                    parsed.tokens[1].locator.clone().unwrap(),
                    "SettingsPage",
                    "settingsItem",
                ),
            ];
            let mods = synth.plan_modifications(&mappings, &parsed.clusters, &report.index);
            for m in &mods {
                assert!(m.new_method_lines.is_empty());
            }
        }
    }

    mod test_generation_tests {
        use super::*;

        #[test]
        fn test_generated_file_shape() {
            let report = report_with_login_page();
            let synth = CodeSynthesizer::new(&report);
            let parsed = ScriptParser::new().parse(
                "await page.goto('/login');\nawait page.getByLabel('Email').fill(email);\nawait expect(page.getByText('Welcome')).toBeVisible();\n",
            );
            let engine = MappingEngine::default();
            let mappings = engine.map(&parsed.tokens, &report.index);
            let file = synth.generate_test(
                &mappings,
                &parsed.clusters,
                &parsed.test_data,
                "log in and verify welcome banner",
            );

            assert_eq!(
                file.file_path,
                Path::new("tests/log-in-and-verify-welcome-banner.spec.ts")
            );
            assert!(file.content.contains("const email = process.env.TEST_EMAIL"));
            assert!(file.content.contains("const password = process.env.TEST_PASSWORD"));
            assert!(file.content.contains("await page.goto('/login');"));
            assert!(file
                .content
                .contains("await expect(page.getByText('Welcome')).toBeVisible();"));
            // intent comments precede each cluster
            assert!(file.content.contains("// Navigate to /login"));
        }

        #[test]
        fn test_fixture_resolution_and_fallback() {
            let report = report_with_login_page();
            let synth = CodeSynthesizer::new(&report);
            let direct = mapping(
                LocatorDescriptor::new(SelectorKind::TestId, "sign-in-button"),
                "LoginPage",
                "signInBtn",
            );
            let orphan = mapping(
                LocatorDescriptor::new(SelectorKind::TestId, "widget"),
                "DashboardPage",
                "widget",
            );
            let fixtures = synth.required_fixtures(&[direct, orphan]);
            assert_eq!(fixtures, vec!["page", "loginPage", "dashboardPage"]);
        }

        #[test]
        fn test_import_from_fixture_file() {
            let mut report = report_with_login_page();
            report.context.fixture_file = Some(PathBuf::from("pages/fixtures.ts"));
            let synth = CodeSynthesizer::new(&report);
            assert_eq!(
                synth.import_lines(),
                vec!["import { test, expect } from '../pages/fixtures';".to_string()]
            );
        }

        #[test]
        fn test_import_without_fixtures() {
            let report = ReconReport::default();
            let synth = CodeSynthesizer::new(&report);
            assert_eq!(
                synth.import_lines(),
                vec!["import { test, expect } from '@playwright/test';".to_string()]
            );
        }
    }

    mod splice_tests {
        use super::*;

        #[test]
        fn test_apply_modification_splices_after_locators() {
            let content = "export class LoginPage {\n  readonly a = this.page.getByTestId('a');\n\n  async go() {\n  }\n}\n";
            let modification = PageObjectModification {
                file_path: PathBuf::from("pages/login.page.ts"),
                class_name: "LoginPage".to_string(),
                new_property_lines: vec!["  readonly b = this.page.getByTestId('b');".to_string()],
                new_method_lines: Vec::new(),
                insertion_line: 2,
            };
            let result = apply_modification(content, &modification);
            let lines: Vec<&str> = result.lines().collect();
            // blank line after insertion point is skipped first
            assert_eq!(lines[3], "  // New locators");
            assert_eq!(lines[4], "  readonly b = this.page.getByTestId('b');");
            // original method untouched below
            assert!(result.contains("async go()"));
            assert!(result.ends_with("}\n"));
        }

        #[test]
        fn test_apply_modification_out_of_range_clamps() {
            let content = "export class X {\n}\n";
            let modification = PageObjectModification {
                file_path: PathBuf::from("x.ts"),
                class_name: "X".to_string(),
                new_property_lines: vec!["  readonly y = this.page.getByTestId('y');".to_string()],
                new_method_lines: Vec::new(),
                insertion_line: 99,
            };
            let result = apply_modification(content, &modification);
            assert!(result.contains("readonly y"));
        }
    }

    mod slug_tests {
        use super::*;

        #[test]
        fn test_slugify_basic() {
            assert_eq!(slugify("Log in & check menu"), "log-in-check-menu");
        }

        #[test]
        fn test_slugify_truncates() {
            let long = "a".repeat(200);
            assert!(slugify(&long).len() <= SLUG_LIMIT);
        }

        #[test]
        fn test_slugify_empty() {
            assert_eq!(slugify("!!!"), "generated-test");
        }
    }
}
