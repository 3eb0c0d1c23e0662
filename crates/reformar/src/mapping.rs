//! Selector-to-page-object ownership resolution.
//!
//! Every distinct selector observed in a parse pass receives exactly
//! one [`SelectorMapping`]: either a direct hit on an indexed locator
//! entry, or a best-effort ownership guess produced by semantic
//! scoring. Guesses always carry a confidence and a reasoning string so
//! callers can assert on uncertainty, not just on the final choice.

use crate::locator::{normalize_word, split_words, LocatorDescriptor};
use crate::parser::ActionToken;
use crate::recon::{PageObjectIndex, PageObjectRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Sentinel class used when no page objects exist at all
pub const UNKNOWN_PAGE_CLASS: &str = "UnknownPage";

/// Keywords marking site-wide chrome that layout/base classes own
const GLOBAL_TERMS: &[&str] = &[
    "header",
    "navigation",
    "footer",
    "sidebar",
    "theme",
    "profile",
    "menu",
    "logout",
];

/// Tunable scoring constants.
///
/// The additive bonuses are calibrated against sampled repositories,
/// not derived; they are configuration, not fixed law.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Bonus when the candidate equals the anchor class
    pub anchor_bonus: f64,
    /// Bonus for global-chrome selectors against layout/base classes
    pub global_bonus: f64,
    /// Score margin below which the tie-breakers apply
    pub tie_margin: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            anchor_bonus: 0.5,
            global_bonus: 0.2,
            tie_margin: 0.1,
        }
    }
}

/// The resolved ownership of one distinct selector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorMapping {
    /// The selector being mapped
    pub selector: LocatorDescriptor,
    /// Owning (or proposed) page-object class
    pub target_class: String,
    /// Existing property name, or the generated name for a new one
    pub target_property: String,
    /// Whether the property must be created
    pub is_new_property: bool,
    /// Mapping confidence in `[0, 1]`
    pub confidence: f64,
    /// Why this target was chosen
    pub reasoning: String,
}

/// One scored ownership candidate
#[derive(Debug, Clone)]
struct Candidate {
    class_name: String,
    score: f64,
    locator_count: usize,
}

/// Ownership resolver
#[derive(Debug, Default)]
pub struct MappingEngine {
    config: ScoringConfig,
}

impl MappingEngine {
    /// Create an engine with the given scoring configuration
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Produce one mapping per distinct selector, in first-seen order.
    ///
    /// Selectors are deduplicated by kind, value, and relevant
    /// qualifiers before mapping.
    #[must_use]
    pub fn map(&self, tokens: &[ActionToken], index: &PageObjectIndex) -> Vec<SelectorMapping> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut anchors: HashMap<String, String> = HashMap::new();
        let mut distinct: Vec<LocatorDescriptor> = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let Some(selector) = &token.locator else {
                continue;
            };
            let key = selector.matching_key();
            if !seen.insert(key.clone()) {
                continue;
            }
            // The immediately preceding token's locator, when already
            // indexed, is a weak ownership signal for this one.
            if i > 0 {
                if let Some(prev) = tokens[i - 1].locator.as_ref() {
                    if let Some((class, _)) = index.find_entry(prev) {
                        let _ = anchors.insert(key, class.to_string());
                    }
                }
            }
            distinct.push(selector.clone());
        }

        distinct
            .into_iter()
            .map(|selector| {
                let anchor = anchors.get(&selector.matching_key()).map(String::as_str);
                self.map_one(&selector, anchor, index)
            })
            .collect()
    }

    /// Resolve one selector through the three ordered strategies
    fn map_one(
        &self,
        selector: &LocatorDescriptor,
        anchor: Option<&str>,
        index: &PageObjectIndex,
    ) -> SelectorMapping {
        // Strategy 1: exact hit against an indexed entry.
        if let Some((class, entry)) = index.find_entry(selector) {
            return SelectorMapping {
                selector: selector.clone(),
                target_class: class.to_string(),
                target_property: entry.property.clone(),
                is_new_property: false,
                confidence: 1.0,
                reasoning: format!("exact match on {class}.{}", entry.property),
            };
        }

        // Strategies 2+3: anchor hint folded into semantic scoring.
        let keywords = selector.keywords();
        let mut candidates: Vec<Candidate> = index
            .iter()
            .map(|record| {
                let mut score = jaccard(&keywords, &class_profile(record));
                let mut notes = Vec::new();
                if anchor == Some(record.class_name.as_str()) {
                    score += self.config.anchor_bonus;
                    notes.push("anchor");
                }
                if hits_global_terms(&keywords) && is_layout_class(&record.class_name) {
                    score += self.config.global_bonus;
                    notes.push("global chrome");
                }
                tracing::trace!(
                    class = %record.class_name,
                    score,
                    notes = ?notes,
                    "candidate scored"
                );
                Candidate {
                    class_name: record.class_name.clone(),
                    score,
                    locator_count: record.locators.len(),
                }
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.class_name.cmp(&b.class_name))
        });

        let property = unique_property_name(selector, index);
        let Some(top) = candidates.first().cloned() else {
            return SelectorMapping {
                selector: selector.clone(),
                target_class: UNKNOWN_PAGE_CLASS.to_string(),
                target_property: property,
                is_new_property: true,
                confidence: 0.5,
                reasoning: "no page objects indexed; proposing a new page object".to_string(),
            };
        };

        let winner = self.pick_winner(&keywords, &candidates, &top);
        SelectorMapping {
            selector: selector.clone(),
            target_class: winner.class_name.clone(),
            target_property: property,
            is_new_property: true,
            confidence: winner.score.min(1.0).max(0.0),
            reasoning: winner.reasoning,
        }
    }

    /// Winner selection with ordered tie-breakers on a close top two
    fn pick_winner(
        &self,
        keywords: &BTreeSet<String>,
        candidates: &[Candidate],
        top: &Candidate,
    ) -> Winner {
        let Some(second) = candidates.get(1) else {
            return Winner::outright(top, "only candidate");
        };
        if top.score - second.score > self.config.tie_margin {
            return Winner::outright(top, "clear margin over runner-up");
        }

        if hits_global_terms(keywords) {
            for candidate in [top, second] {
                if candidate.class_name.to_lowercase().contains("layout") {
                    return Winner {
                        class_name: candidate.class_name.clone(),
                        score: candidate.score,
                        reasoning: format!(
                            "tie-break: global-chrome selector prefers {}",
                            candidate.class_name
                        ),
                    };
                }
            }
        }
        if second.locator_count > top.locator_count {
            return Winner {
                class_name: second.class_name.clone(),
                score: second.score,
                reasoning: format!(
                    "tie-break: {} holds more locators ({} > {})",
                    second.class_name, second.locator_count, top.locator_count
                ),
            };
        }
        if top.locator_count > second.locator_count {
            return Winner {
                class_name: top.class_name.clone(),
                score: top.score,
                reasoning: format!(
                    "tie-break: {} holds more locators ({} > {})",
                    top.class_name, top.locator_count, second.locator_count
                ),
            };
        }
        Winner::outright(top, "tie unresolved; keeping top-ranked candidate")
    }
}

#[derive(Debug)]
struct Winner {
    class_name: String,
    score: f64,
    reasoning: String,
}

impl Winner {
    fn outright(candidate: &Candidate, why: &str) -> Self {
        Self {
            class_name: candidate.class_name.clone(),
            score: candidate.score,
            reasoning: format!(
                "scored {:.2} against {}: {why}",
                candidate.score, candidate.class_name
            ),
        }
    }
}

/// Responsibility keyword profile of an indexed class: words from its
/// name, property names, and method names, suffix-normalized
fn class_profile(record: &PageObjectRecord) -> BTreeSet<String> {
    let mut words: Vec<String> = split_words(&record.class_name);
    for entry in &record.locators {
        words.extend(split_words(&entry.property));
    }
    for method in &record.methods {
        words.extend(split_words(&method.name));
    }
    words.iter().map(|w| normalize_word(w)).collect()
}

/// Intersection-over-union of two keyword sets
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn hits_global_terms(keywords: &BTreeSet<String>) -> bool {
    GLOBAL_TERMS.iter().any(|term| keywords.contains(*term))
}

fn is_layout_class(class_name: &str) -> bool {
    let lower = class_name.to_lowercase();
    lower.contains("layout") || lower.contains("base")
}

/// Grammar-driven property name, nudged past collisions with existing
/// properties on any indexed class
fn unique_property_name(selector: &LocatorDescriptor, index: &PageObjectIndex) -> String {
    let base = selector.property_name();
    let taken = index.iter().any(|record| {
        record
            .locators
            .iter()
            .any(|entry| entry.property == base)
    });
    if taken {
        format!("{base}2")
    } else {
        base
    }
}
