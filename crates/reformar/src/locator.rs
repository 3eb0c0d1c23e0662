//! Locator grammar: the fixed vocabulary of element references.
//!
//! Every other stage of the pipeline speaks in [`LocatorDescriptor`]s:
//! the parser derives them from raw script text, reconnaissance
//! recovers them from indexed page-object source, the mapping engine
//! deduplicates and scores them, and the synthesizer renders them back
//! into source text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The kind of element reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorKind {
    /// `data-testid` attribute lookup
    TestId,
    /// Accessibility role, with an optional accessible-name qualifier
    Role,
    /// Form label text
    Label,
    /// Input placeholder text
    Placeholder,
    /// Visible text content
    Text,
    /// Raw structural (CSS) selector
    Css,
}

impl SelectorKind {
    /// The surface constructor name for this kind
    #[must_use]
    pub fn constructor(self) -> &'static str {
        match self {
            Self::TestId => "getByTestId",
            Self::Role => "getByRole",
            Self::Label => "getByLabel",
            Self::Placeholder => "getByPlaceholder",
            Self::Text => "getByText",
            Self::Css => "locator",
        }
    }

    /// Parse a surface constructor name
    #[must_use]
    pub fn from_constructor(name: &str) -> Option<Self> {
        match name {
            "getByTestId" => Some(Self::TestId),
            "getByRole" => Some(Self::Role),
            "getByLabel" => Some(Self::Label),
            "getByPlaceholder" => Some(Self::Placeholder),
            "getByText" => Some(Self::Text),
            "locator" => Some(Self::Css),
            _ => None,
        }
    }
}

/// A parsed element reference.
///
/// Two descriptors match for mapping purposes when their kind, value,
/// and the options relevant to that kind are equal. For [`SelectorKind::Role`]
/// the accessible name and exactness qualifiers are relevant; for every
/// other kind only the primary value is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorDescriptor {
    /// Grammar kind
    pub kind: SelectorKind,
    /// Primary value (test id, role, label text, css selector, ...)
    pub value: String,
    /// Accessible-name qualifier (role selectors only)
    pub name: Option<String>,
    /// Exact-match qualifier (role selectors only)
    pub exact: bool,
    /// The source text this descriptor was derived from
    pub original: String,
}

impl LocatorDescriptor {
    /// Create a descriptor with no qualifiers
    #[must_use]
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind,
            original: value.clone(),
            value,
            name: None,
            exact: false,
        }
    }

    /// Attach an accessible-name qualifier
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach the original source text
    #[must_use]
    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original = original.into();
        self
    }

    /// Deduplication key: kind, value, and the qualifiers relevant to
    /// the kind.
    #[must_use]
    pub fn matching_key(&self) -> String {
        match self.kind {
            SelectorKind::Role => format!(
                "role|{}|{}|{}",
                self.value,
                self.name.as_deref().unwrap_or(""),
                self.exact
            ),
            _ => format!("{:?}|{}", self.kind, self.value),
        }
    }

    /// Canonical rendering rooted at `page`
    #[must_use]
    pub fn render(&self) -> String {
        self.render_rooted("page")
    }

    /// Canonical rendering against an arbitrary receiver expression
    #[must_use]
    pub fn render_rooted(&self, receiver: &str) -> String {
        let ctor = self.kind.constructor();
        match (&self.name, self.exact) {
            (Some(name), true) => format!(
                "{receiver}.{ctor}('{}', {{ name: '{name}', exact: true }})",
                self.value
            ),
            (Some(name), false) => {
                format!("{receiver}.{ctor}('{}', {{ name: '{name}' }})", self.value)
            }
            (None, _) => format!("{receiver}.{ctor}('{}')", self.value),
        }
    }

    /// Keyword set for semantic scoring: words from the value and the
    /// accessible name, lowercased, with common suffix abbreviations
    /// normalized.
    #[must_use]
    pub fn keywords(&self) -> BTreeSet<String> {
        let mut words: Vec<String> = split_words(&self.value);
        if let Some(name) = &self.name {
            words.extend(split_words(name));
        }
        words.into_iter().map(|w| normalize_word(&w)).collect()
    }

    /// Derive a lower-camel property name for a newly created locator
    /// entry. Role selectors name after the accessible name plus a
    /// role-derived suffix; label/placeholder selectors get a `Field`
    /// suffix; raw selectors fall back to `Element`.
    #[must_use]
    pub fn property_name(&self) -> String {
        let (base_words, suffix) = match self.kind {
            SelectorKind::Role => {
                let base = self.name.as_deref().unwrap_or(&self.value);
                (split_words(base), role_suffix(&self.value))
            }
            SelectorKind::TestId => (split_words(&self.value), ""),
            SelectorKind::Label | SelectorKind::Placeholder => {
                (split_words(&self.value), "Field")
            }
            SelectorKind::Text => (split_words(&self.value), "Text"),
            SelectorKind::Css => (split_words(&self.value), "Element"),
        };
        let mut words: Vec<String> = base_words;
        if words.is_empty() {
            words.push("unnamed".to_string());
        }
        // Keep derived names bounded for long text selectors.
        words.truncate(4);
        let suffix_lower = suffix.to_lowercase();
        if !suffix.is_empty() && words.last().map(String::as_str) != Some(suffix_lower.as_str()) {
            words.push(suffix_lower);
        }
        lower_camel(&words)
    }
}

/// Map an accessibility role to a property-name suffix
fn role_suffix(role: &str) -> &'static str {
    match role {
        "button" => "Button",
        "link" => "Link",
        "textbox" | "searchbox" | "spinbutton" => "Input",
        "checkbox" => "Checkbox",
        "radio" => "Radio",
        "combobox" | "listbox" => "Select",
        "heading" => "Heading",
        "menuitem" | "option" => "Option",
        _ => "Element",
    }
}

/// Split an identifier or phrase into lowercase words: breaks on
/// non-alphanumeric delimiters and on camelCase boundaries.
#[must_use]
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(current.to_lowercase());
                current = String::new();
            }
            prev_lower = ch.is_lowercase() || ch.is_numeric();
            current.push(ch);
        } else {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current = String::new();
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        words.push(current.to_lowercase());
    }
    words
}

/// Normalize common abbreviations so `submitBtn` and a `button` role
/// profile share a keyword.
#[must_use]
pub fn normalize_word(word: &str) -> String {
    match word {
        "btn" => "button".to_string(),
        "img" => "image".to_string(),
        "nav" => "navigation".to_string(),
        "pwd" => "password".to_string(),
        "msg" => "message".to_string(),
        "txt" => "text".to_string(),
        other => other.to_string(),
    }
}

/// Join lowercase words into a lowerCamelCase identifier
#[must_use]
pub fn lower_camel(words: &[String]) -> String {
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Compiled recognizers for the locator constructor surface syntax.
///
/// Owned by the parser and reconnaissance rather than kept in statics;
/// compiling the table is cheap and keeps the grammar self-contained.
#[derive(Debug, Clone)]
pub struct LocatorGrammar {
    constructor: Regex,
    option_name: Regex,
    option_exact: Regex,
    identifier_like: Regex,
}

impl Default for LocatorGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorGrammar {
    /// Compile the grammar's recognizers
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructor: Regex::new(
                r#"(getByTestId|getByRole|getByLabel|getByPlaceholder|getByText|locator)\(\s*['"]([^'"]+)['"]\s*(?:,\s*\{([^}]*)\})?\s*\)"#,
            )
            .expect("valid constructor pattern"),
            option_name: Regex::new(r#"name\s*:\s*['"]([^'"]+)['"]"#)
                .expect("valid name-option pattern"),
            option_exact: Regex::new(r"exact\s*:\s*true").expect("valid exact-option pattern"),
            identifier_like: Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$")
                .expect("valid identifier pattern"),
        }
    }

    /// Parse the first locator constructor call found in `text`.
    ///
    /// Returns `None` when no grammar constructor appears.
    #[must_use]
    pub fn parse_constructor(&self, text: &str) -> Option<LocatorDescriptor> {
        let caps = self.constructor.captures(text)?;
        let kind = SelectorKind::from_constructor(&caps[1])?;
        let value = caps[2].to_string();
        let mut descriptor = LocatorDescriptor::new(kind, value).with_original(&caps[0]);
        if let Some(options) = caps.get(3) {
            if kind == SelectorKind::Role {
                if let Some(name) = self.option_name.captures(options.as_str()) {
                    descriptor.name = Some(name[1].to_string());
                }
                descriptor.exact = self.option_exact.is_match(options.as_str());
            }
        }
        Some(descriptor)
    }

    /// Classify a bare quoted literal: identifier-like values are test
    /// ids, anything else is a raw structural selector.
    #[must_use]
    pub fn classify_literal(&self, literal: &str) -> LocatorDescriptor {
        if self.identifier_like.is_match(literal) {
            LocatorDescriptor::new(SelectorKind::TestId, literal)
        } else {
            LocatorDescriptor::new(SelectorKind::Css, literal)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod kind_tests {
        use super::*;

        #[test]
        fn test_constructor_round_trip() {
            for kind in [
                SelectorKind::TestId,
                SelectorKind::Role,
                SelectorKind::Label,
                SelectorKind::Placeholder,
                SelectorKind::Text,
                SelectorKind::Css,
            ] {
                assert_eq!(SelectorKind::from_constructor(kind.constructor()), Some(kind));
            }
        }

        #[test]
        fn test_unknown_constructor() {
            assert_eq!(SelectorKind::from_constructor("getByAltText"), None);
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_test_id() {
            let grammar = LocatorGrammar::new();
            let d = grammar
                .parse_constructor("page.getByTestId('sign-in-button')")
                .unwrap();
            assert_eq!(d.kind, SelectorKind::TestId);
            assert_eq!(d.value, "sign-in-button");
            assert_eq!(d.name, None);
        }

        #[test]
        fn test_parse_role_with_name() {
            let grammar = LocatorGrammar::new();
            let d = grammar
                .parse_constructor("getByRole('button', { name: 'Submit' })")
                .unwrap();
            assert_eq!(d.kind, SelectorKind::Role);
            assert_eq!(d.value, "button");
            assert_eq!(d.name.as_deref(), Some("Submit"));
            assert!(!d.exact);
        }

        #[test]
        fn test_parse_role_exact() {
            let grammar = LocatorGrammar::new();
            let d = grammar
                .parse_constructor("getByRole('link', { name: 'Home', exact: true })")
                .unwrap();
            assert!(d.exact);
        }

        #[test]
        fn test_parse_raw_selector() {
            let grammar = LocatorGrammar::new();
            let d = grammar.parse_constructor("page.locator('#submit')").unwrap();
            assert_eq!(d.kind, SelectorKind::Css);
            assert_eq!(d.value, "#submit");
        }

        #[test]
        fn test_no_constructor() {
            let grammar = LocatorGrammar::new();
            assert!(grammar.parse_constructor("page.goto('/login')").is_none());
        }

        #[test]
        fn test_classify_literal() {
            let grammar = LocatorGrammar::new();
            assert_eq!(
                grammar.classify_literal("sign-in").kind,
                SelectorKind::TestId
            );
            assert_eq!(
                grammar.classify_literal("#form > button").kind,
                SelectorKind::Css
            );
        }
    }

    mod matching_tests {
        use super::*;

        #[test]
        fn test_role_key_includes_name() {
            let a = LocatorDescriptor::new(SelectorKind::Role, "button").with_name("Submit");
            let b = LocatorDescriptor::new(SelectorKind::Role, "button").with_name("Cancel");
            assert_ne!(a.matching_key(), b.matching_key());
        }

        #[test]
        fn test_non_role_key_ignores_name() {
            let a = LocatorDescriptor::new(SelectorKind::TestId, "save");
            let b = LocatorDescriptor::new(SelectorKind::TestId, "save").with_name("whatever");
            assert_eq!(a.matching_key(), b.matching_key());
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_render_simple() {
            let d = LocatorDescriptor::new(SelectorKind::Label, "Email");
            assert_eq!(d.render(), "page.getByLabel('Email')");
        }

        #[test]
        fn test_render_role_with_name() {
            let d = LocatorDescriptor::new(SelectorKind::Role, "button").with_name("Submit");
            assert_eq!(
                d.render(),
                "page.getByRole('button', { name: 'Submit' })"
            );
        }

        #[test]
        fn test_render_rooted() {
            let d = LocatorDescriptor::new(SelectorKind::TestId, "save");
            assert_eq!(
                d.render_rooted("this.page"),
                "this.page.getByTestId('save')"
            );
        }

        #[test]
        fn test_render_parse_round_trip() {
            let grammar = LocatorGrammar::new();
            let d = LocatorDescriptor::new(SelectorKind::Role, "button").with_name("Sign in");
            let reparsed = grammar.parse_constructor(&d.render()).unwrap();
            assert_eq!(reparsed.matching_key(), d.matching_key());
        }
    }

    mod naming_tests {
        use super::*;

        #[test]
        fn test_split_words_camel_and_kebab() {
            assert_eq!(split_words("signInBtn"), vec!["sign", "in", "btn"]);
            assert_eq!(split_words("sign-in-button"), vec!["sign", "in", "button"]);
        }

        #[test]
        fn test_property_name_role() {
            let d = LocatorDescriptor::new(SelectorKind::Role, "button").with_name("Submit");
            assert_eq!(d.property_name(), "submitButton");
        }

        #[test]
        fn test_property_name_no_double_suffix() {
            let d = LocatorDescriptor::new(SelectorKind::Role, "button").with_name("Submit Button");
            assert_eq!(d.property_name(), "submitButton");
        }

        #[test]
        fn test_property_name_label() {
            let d = LocatorDescriptor::new(SelectorKind::Label, "Email");
            assert_eq!(d.property_name(), "emailField");
        }

        #[test]
        fn test_property_name_test_id() {
            let d = LocatorDescriptor::new(SelectorKind::TestId, "sign-in-button");
            assert_eq!(d.property_name(), "signInButton");
        }

        #[test]
        fn test_keywords_normalized() {
            let d = LocatorDescriptor::new(SelectorKind::TestId, "submit-btn");
            assert!(d.keywords().contains("button"));
            assert!(d.keywords().contains("submit"));
        }
    }
}
