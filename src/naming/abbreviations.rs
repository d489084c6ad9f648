//! Abbreviation dictionary used during normalization.
//!
//! Entries are seeded from configuration (`LFC = "LIFECYCLE"`). Both sides of
//! an entry are tokenized and folded the same way identifiers are, so the
//! abbreviation and its expansion normalize to the same canonical tokens.

use std::collections::{BTreeMap, HashMap};

use super::{fold_tokens, tokenize};

/// Bidirectional abbreviation lookup keyed by folded token sequences.
#[derive(Debug, Clone, Default)]
pub struct AbbreviationDictionary {
    /// Joined abbreviation tokens -> expansion tokens.
    entries: BTreeMap<String, Vec<String>>,
}

impl AbbreviationDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from configured `abbreviation -> expansion` pairs.
    ///
    /// Blank keys or values are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut dict = Self::new();
        for (abbreviation, expansion) in map {
            dict.insert(abbreviation, expansion);
        }
        dict
    }

    /// Add an entry.
    pub fn insert(&mut self, abbreviation: &str, expansion: &str) {
        let key = fold_tokens(tokenize(abbreviation)).concat();
        let value = fold_tokens(tokenize(expansion));
        if key.is_empty() || value.is_empty() {
            return;
        }
        // Self-mapping entries are no-ops.
        if value.concat() == key {
            return;
        }
        self.entries.insert(key, value);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand a folded token sequence.
    ///
    /// A whole-identifier entry wins (`usr_info -> user_information`);
    /// otherwise tokens are expanded one at a time. Tokens without an entry
    /// pass through unchanged.
    pub fn expand(&self, tokens: Vec<String>) -> Vec<String> {
        if self.entries.is_empty() {
            return tokens;
        }

        if let Some(whole) = self.entries.get(&tokens.concat()) {
            return whole.clone();
        }

        let mut expanded = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.entries.get(&token) {
                Some(expansion) => expanded.extend(expansion.iter().cloned()),
                None => expanded.push(token),
            }
        }
        expanded
    }
}
