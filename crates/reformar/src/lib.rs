//! Reformar: POM-Aware Test Refactoring Pipeline
//!
//! Reformar (Spanish: "to reshape/reform") converts a flat recorded
//! browser script into code that matches a target repository's Page
//! Object Model conventions: existing locators are reused, missing ones
//! are added in the repository's own declaration style, and the
//! resulting test is run and repaired until it passes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    REFORMAR Pipeline                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────┐  ┌────────┐  ┌─────────┐  ┌───────┐  ┌─────────┐  │
//! │  │ Recon │─►│ Parser │─►│ Mapping │─►│ Synth │─►│ Verify  │  │
//! │  │ (scan)│  │(cluster)│ │ (score) │  │(style)│  │ (retry) │  │
//! │  └───────┘  └────────┘  └─────────┘  └───────┘  └─────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Locator grammar: parsing and rendering selector expressions
pub mod locator;

/// Ownership resolution: which page object owns each selector
pub mod mapping;

/// Recording parser: tokenization, clustering, test-data extraction
pub mod parser;

/// Phase orchestration and the run report
pub mod pipeline;

/// Repository reconnaissance: structure, style, locator inventory
pub mod recon;

/// Error and result types
pub mod result;

/// Style-matched code synthesis
pub mod synth;

/// Self-correcting verification loop
pub mod verify;

pub use locator::{
    LocatorDescriptor, LocatorGrammar, SelectorKind, lower_camel, normalize_word, split_words,
};
pub use mapping::{MappingEngine, ScoringConfig, SelectorMapping, UNKNOWN_PAGE_CLASS};
pub use parser::{
    ActionToken, ClusterKind, OpKind, ParsedScript, ScriptParser, SemanticCluster, TestDataItem,
    TestDataUsage,
};
pub use pipeline::{KnowledgeGraph, Pipeline, PipelineConfig, RunReport, check_generated};
pub use recon::{
    DeclarationStyle, FixtureEntry, FixtureRegistry, LocatorEntry, MethodSignature,
    PageObjectIndex, PageObjectRecord, ReconReport, Reconnaissance, RepoKind, RepositoryContext,
    StyleProfile,
};
pub use result::{ReformarError, ReformarResult};
pub use synth::{
    CodeSynthesizer, GeneratedTestFile, PageObjectModification, apply_modification, slugify,
};
pub use verify::{
    DEFAULT_EXEC_TIMEOUT, DEFAULT_MAX_RETRIES, FailureKind, FixAction, VerificationLoop,
    VerificationOutcome, classify_failure,
};
