//! Repository reconnaissance.
//!
//! Scans the target repository once per run and produces everything the
//! downstream phases need: where page objects and tests live, how
//! locator properties are declared, which classes own which locators,
//! and which fixture name hands a test each page-object instance.
//!
//! Discovery is best-effort by design: an unrecognizable layout
//! degrades to an empty index so the pipeline can still propose new
//! page objects. Only a missing repository root is fatal.

use crate::locator::{LocatorDescriptor, LocatorGrammar};
use crate::result::{ReformarError, ReformarResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum page-object files sampled for style detection
const STYLE_SAMPLE_LIMIT: usize = 5;

/// Candidate page-object directories, in priority order
const PAGE_OBJECT_DIRS: &[&str] = &[
    "pages",
    "page-objects",
    "pageobjects",
    "pom",
    "src/pages",
    "lib/pages",
    "e2e/pages",
    "tests/pages",
];

/// Candidate test directories, in priority order
const TEST_DIRS: &[&str] = &["tests", "test", "e2e", "specs", "src/tests"];

/// Candidate fixture file names, in priority order
const FIXTURE_FILES: &[&str] = &["fixtures.ts", "fixture.ts", "base.ts"];

/// Repository classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepoKind {
    /// Conventional page-object layout
    StandardPom,
    /// Page objects split into component classes
    ComponentBased,
    /// No recognizable layout
    #[default]
    Unknown,
}

/// Discovered facts about the target repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryContext {
    /// Classification of the layout
    pub kind: RepoKind,
    /// Page-object directory, when found
    pub page_object_dir: Option<PathBuf>,
    /// Test directory, when found
    pub test_dir: Option<PathBuf>,
    /// Fixture-definition file, when found
    pub fixture_file: Option<PathBuf>,
    /// Whether a framework configuration file is present
    pub has_framework_config: bool,
}

/// How locator properties are declared in the sampled page objects
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeclarationStyle {
    /// Raw locator wrapped in an auxiliary control class
    Wrapper {
        /// The wrapper class name (e.g. `Button`)
        class_name: String,
    },
    /// Getter returning the locator
    Getter,
    /// Plain native assignment
    #[default]
    Native,
}

/// Detected source conventions.
///
/// Approximate by construction: each attribute is last-write-wins over
/// the sampled files, not a vote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleProfile {
    /// Locator declaration style
    pub declaration: DeclarationStyle,
    /// Base class page objects extend, when any sampled file does
    pub base_class: Option<String>,
    /// Visibility keyword on locator properties, when declared
    pub visibility: Option<String>,
    /// Import lines seen across samples, deduplicated
    pub imports: Vec<String>,
}

/// A locator property bound inside a page-object class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorEntry {
    /// Property name
    pub property: String,
    /// Parsed locator
    pub descriptor: LocatorDescriptor,
    /// 1-based source line
    pub line: usize,
}

/// A method declared on a page-object class (constructor excluded)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Raw parameter list text
    pub params: String,
    /// 1-based source line
    pub line: usize,
}

/// One indexed page-object class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageObjectRecord {
    /// Class name
    pub class_name: String,
    /// Source file path
    pub file_path: PathBuf,
    /// Base class, when the class extends one
    pub base_class: Option<String>,
    /// Locator entries in source order
    pub locators: Vec<LocatorEntry>,
    /// Method signatures in source order
    pub methods: Vec<MethodSignature>,
}

/// Index of every discovered page-object class, keyed by class name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageObjectIndex {
    records: BTreeMap<String, PageObjectRecord>,
}

impl PageObjectIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, keyed by its class name
    pub fn insert(&mut self, record: PageObjectRecord) {
        let _ = self.records.insert(record.class_name.clone(), record);
    }

    /// Look up a record by class name
    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<&PageObjectRecord> {
        self.records.get(class_name)
    }

    /// Iterate records in class-name order
    pub fn iter(&self) -> impl Iterator<Item = &PageObjectRecord> {
        self.records.values()
    }

    /// Number of indexed classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any class was indexed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the class and property owning an exactly-matching locator
    #[must_use]
    pub fn find_entry(&self, descriptor: &LocatorDescriptor) -> Option<(&str, &LocatorEntry)> {
        let key = descriptor.matching_key();
        for record in self.records.values() {
            for entry in &record.locators {
                if entry.descriptor.matching_key() == key {
                    return Some((record.class_name.as_str(), entry));
                }
            }
        }
        None
    }
}

/// One fixture definition: which class the name hands out, and how it
/// is instantiated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureEntry {
    /// Page-object class name
    pub class_name: String,
    /// Instantiation expression, e.g. `new LoginPage(page)`
    pub instantiation: String,
}

/// Fixture name → class mapping extracted from the fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureRegistry {
    entries: BTreeMap<String, FixtureEntry>,
}

impl FixtureRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry unless the name is already taken.
    ///
    /// The secondary extraction pass uses this so it never overwrites
    /// entries found by the primary idiom.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, entry: FixtureEntry) {
        let _ = self.entries.entry(name.into()).or_insert(entry);
    }

    /// Look up an entry by fixture name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FixtureEntry> {
        self.entries.get(name)
    }

    /// Iterate entries in fixture-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FixtureEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Find the fixture name serving a given class
    #[must_use]
    pub fn fixture_for_class(&self, class_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.class_name == class_name)
            .map(|(name, _)| name.as_str())
    }

    /// Number of registered fixtures
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything reconnaissance learned about the repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconReport {
    /// Discovered structure
    pub context: RepositoryContext,
    /// Detected conventions
    pub style: StyleProfile,
    /// Indexed page objects
    pub index: PageObjectIndex,
    /// Fixture name → class mapping
    pub fixtures: FixtureRegistry,
}

/// Repository scanner
#[derive(Debug)]
pub struct Reconnaissance {
    grammar: LocatorGrammar,
    class_decl: Regex,
    getter_decl: Regex,
    assignment_decl: Regex,
    wrapper_ctor: Regex,
    method_decl: Regex,
    import_line: Regex,
    fixture_primary: Regex,
    fixture_type_field: Regex,
}

impl Default for Reconnaissance {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconnaissance {
    /// Compile the scanner's recognizers
    #[must_use]
    pub fn new() -> Self {
        Self {
            grammar: LocatorGrammar::new(),
            class_decl: Regex::new(r"class\s+([A-Za-z_]\w*)(?:\s+extends\s+([A-Za-z_]\w*))?")
                .expect("valid class pattern"),
            getter_decl: Regex::new(r"^\s*get\s+([A-Za-z_]\w*)\s*\(\s*\)")
                .expect("valid getter pattern"),
            assignment_decl: Regex::new(
                r"^\s*(?:(readonly|private|public|protected)\s+)?(?:this\.)?([A-Za-z_]\w*)\s*[:=]",
            )
            .expect("valid assignment pattern"),
            wrapper_ctor: Regex::new(r"=\s*new\s+([A-Z]\w*)\s*\(").expect("valid wrapper pattern"),
            method_decl: Regex::new(r"^\s*(?:async\s+)?([a-z_]\w*)\s*\(([^)]*)\)\s*\{")
                .expect("valid method pattern"),
            import_line: Regex::new(r"^\s*import\s").expect("valid import pattern"),
            fixture_primary: Regex::new(
                r"(?s)([A-Za-z_]\w*)\s*:\s*async\s*\(\s*\{\s*page\s*\}\s*,\s*use\s*\)\s*=>\s*\{.*?use\(\s*(new\s+([A-Za-z_]\w*)\s*\(\s*page\s*\))\s*\)",
            )
            .expect("valid fixture pattern"),
            fixture_type_field: Regex::new(r"^\s*([A-Za-z_]\w*)\s*:\s*([A-Z]\w*)\s*;?\s*$")
                .expect("valid fixture-type pattern"),
        }
    }

    /// Scan the repository rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ReformarError::RepositoryNotFound`] when the root does
    /// not exist. Every other discovery failure degrades to an empty or
    /// partial report.
    pub fn scan(&self, root: &Path) -> ReformarResult<ReconReport> {
        if !root.is_dir() {
            return Err(ReformarError::RepositoryNotFound {
                path: root.display().to_string(),
            });
        }

        let context = self.discover_context(root);
        tracing::debug!(kind = ?context.kind, "repository classified");

        let mut report = ReconReport {
            context,
            ..ReconReport::default()
        };
        let Some(po_dir) = report.context.page_object_dir.clone() else {
            return Ok(report);
        };

        let files = page_object_files(&po_dir, report.context.fixture_file.as_deref());
        report.style = self.detect_style(&files);
        for file in &files {
            if let Some(record) = self.index_file(file) {
                report.index.insert(record);
            }
        }
        if let Some(fixture_file) = &report.context.fixture_file {
            report.fixtures = self.parse_fixtures(fixture_file);
        }
        tracing::info!(
            classes = report.index.len(),
            fixtures = report.fixtures.len(),
            "reconnaissance complete"
        );
        Ok(report)
    }

    /// Probe the conventional directory layout
    fn discover_context(&self, root: &Path) -> RepositoryContext {
        let page_object_dir = first_existing_dir(root, PAGE_OBJECT_DIRS);
        let test_dir = first_existing_dir(root, TEST_DIRS);
        let fixture_file = page_object_dir.as_deref().and_then(|dir| {
            FIXTURE_FILES
                .iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        });
        let has_framework_config = root.join("playwright.config.ts").is_file()
            || root.join("playwright.config.js").is_file();

        let kind = match &page_object_dir {
            Some(dir) => {
                let has_components = dir.join("components").is_dir()
                    || dir.parent().is_some_and(|p| p.join("components").is_dir());
                if has_components {
                    RepoKind::ComponentBased
                } else {
                    RepoKind::StandardPom
                }
            }
            None => RepoKind::Unknown,
        };

        RepositoryContext {
            kind,
            page_object_dir,
            test_dir,
            fixture_file,
            has_framework_config,
        }
    }

    /// Detect declaration conventions from a bounded sample.
    ///
    /// Per-attribute last-write-wins across the sample; an accepted
    /// approximation rather than a voting scheme.
    fn detect_style(&self, files: &[PathBuf]) -> StyleProfile {
        let mut profile = StyleProfile::default();
        for file in files.iter().take(STYLE_SAMPLE_LIMIT) {
            let Ok(content) = fs::read_to_string(file) else {
                continue;
            };
            for line in content.lines() {
                if self.import_line.is_match(line) {
                    let trimmed = line.trim().to_string();
                    if !profile.imports.contains(&trimmed) {
                        profile.imports.push(trimmed);
                    }
                }
            }
            if let Some(caps) = self.class_decl.captures(&content) {
                if let Some(base) = caps.get(2) {
                    profile.base_class = Some(base.as_str().to_string());
                }
            }
            for line in content.lines() {
                if self.grammar.parse_constructor(line).is_none() || !line.contains("page.") {
                    continue;
                }
                if let Some(caps) = self.wrapper_ctor.captures(line) {
                    profile.declaration = DeclarationStyle::Wrapper {
                        class_name: caps[1].to_string(),
                    };
                } else if self.getter_decl.is_match(line) {
                    profile.declaration = DeclarationStyle::Getter;
                } else {
                    profile.declaration = DeclarationStyle::Native;
                }
                if let Some(caps) = self.assignment_decl.captures(line) {
                    if let Some(vis) = caps.get(1) {
                        profile.visibility = Some(vis.as_str().to_string());
                    }
                }
                break;
            }
        }
        profile
    }

    /// Index one page-object source file. Files without a class
    /// declaration are skipped.
    fn index_file(&self, file: &Path) -> Option<PageObjectRecord> {
        let content = fs::read_to_string(file).ok()?;
        let caps = self.class_decl.captures(&content)?;
        let class_name = caps[1].to_string();
        let base_class = caps.get(2).map(|m| m.as_str().to_string());

        let mut locators = Vec::new();
        let mut methods = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line_no = i + 1;
            if line.contains("page.") {
                if let Some(descriptor) = self.grammar.parse_constructor(line) {
                    if let Some(property) = self.property_name_on(line) {
                        locators.push(LocatorEntry {
                            property,
                            descriptor,
                            line: line_no,
                        });
                        continue;
                    }
                }
            }
            if let Some(caps) = self.method_decl.captures(line) {
                let name = caps[1].to_string();
                if !is_reserved_word(&name) {
                    methods.push(MethodSignature {
                        name,
                        params: caps[2].trim().to_string(),
                        line: line_no,
                    });
                }
            }
        }

        Some(PageObjectRecord {
            class_name,
            file_path: file.to_path_buf(),
            base_class,
            locators,
            methods,
        })
    }

    /// Extract the property name a locator-bearing line declares
    fn property_name_on(&self, line: &str) -> Option<String> {
        if let Some(caps) = self.getter_decl.captures(line) {
            return Some(caps[1].to_string());
        }
        self.assignment_decl
            .captures(line)
            .map(|caps| caps[2].to_string())
    }

    /// Extract the fixture name → class mapping from the fixture file.
    ///
    /// The injection-definition idiom is the primary source; the
    /// auxiliary type declaration fills in names the first pass missed
    /// without overwriting anything.
    fn parse_fixtures(&self, file: &Path) -> FixtureRegistry {
        let mut registry = FixtureRegistry::new();
        let Ok(content) = fs::read_to_string(file) else {
            return registry;
        };

        for caps in self.fixture_primary.captures_iter(&content) {
            registry.insert_if_absent(
                caps[1].to_string(),
                FixtureEntry {
                    class_name: caps[3].to_string(),
                    instantiation: caps[2].to_string(),
                },
            );
        }

        let mut in_type_block = false;
        for line in content.lines() {
            if line.contains("type ") && line.contains('{') {
                in_type_block = true;
                continue;
            }
            if in_type_block {
                if line.contains('}') {
                    in_type_block = false;
                    continue;
                }
                if let Some(caps) = self.fixture_type_field.captures(line) {
                    let class_name = caps[2].to_string();
                    registry.insert_if_absent(
                        caps[1].to_string(),
                        FixtureEntry {
                            instantiation: format!("new {class_name}(page)"),
                            class_name,
                        },
                    );
                }
            }
        }
        registry
    }
}

/// First existing directory among the ordered candidates
fn first_existing_dir(root: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_dir())
}

/// Source files in the page-object directory, sorted for determinism,
/// with recognized fixture files excluded
fn page_object_files(dir: &Path, fixture_file: Option<&Path>) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "ts")
                && Some(path.as_path()) != fixture_file
                && !path
                    .file_name()
                    .is_some_and(|name| FIXTURE_FILES.iter().any(|f| name == *f))
        })
        .collect();
    files.sort();
    files
}

/// Words that look like method declarations but are control flow
fn is_reserved_word(word: &str) -> bool {
    matches!(
        word,
        "constructor" | "if" | "for" | "while" | "switch" | "catch" | "return" | "function"
    )
}
