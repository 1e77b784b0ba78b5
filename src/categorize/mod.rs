//! Regex-driven error categorization.
//!
//! Categories are loaded once as a name → pattern-list map; every pattern is
//! compiled case-insensitively up front so classification is a scan over
//! precompiled automata. Patterns that fail to compile are dropped silently
//! (the load never fails because of one bad pattern).

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use regex::{Regex, RegexBuilder};

use crate::constants::CATEGORY_UNCATEGORISED;

/// Classifies free-text messages into a single category name.
///
/// Categories are kept in a `BTreeMap`, so when more than one category could
/// match a message the winner is deterministic: categories are scanned in
/// lexicographic name order. Within one category the listed pattern order is
/// preserved and the first hit wins.
#[derive(Debug, Default)]
pub struct ErrorCategorizer {
    patterns: RwLock<BTreeMap<String, Vec<Regex>>>,
}

impl ErrorCategorizer {
    /// Create a categorizer with no categories loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and install a category → patterns map, replacing any
    /// previously loaded state atomically: readers see either the old set or
    /// the new set, never a mix.
    ///
    /// Invalid regex patterns are skipped; a category whose patterns all
    /// fail to compile is not installed.
    pub fn load_categories(&self, categories: &HashMap<String, Vec<String>>) {
        let mut compiled = BTreeMap::new();
        for (category, patterns) in categories {
            let mut list = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => list.push(regex),
                    Err(error) => {
                        tracing::debug!(category, pattern, %error, "skipping invalid pattern");
                    }
                }
            }
            if !list.is_empty() {
                compiled.insert(category.clone(), list);
            }
        }

        *self.patterns.write().unwrap() = compiled;
    }

    /// Name of the first category with a pattern matching anywhere in
    /// `message`, or `errors_uncategorised` when nothing matches.
    #[must_use]
    pub fn categorize(&self, message: &str) -> String {
        let patterns = self.patterns.read().unwrap();
        for (category, list) in patterns.iter() {
            if list.iter().any(|regex| regex.is_match(message)) {
                return category.clone();
            }
        }
        CATEGORY_UNCATEGORISED.to_string()
    }

    /// Names of every loaded category, in scan order.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.patterns.read().unwrap().keys().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
