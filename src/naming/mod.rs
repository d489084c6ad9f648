//! Identifier normalization.
//!
//! Produces a canonical form of a table/column identifier for comparison:
//!
//! ```text
//! "USER_PROFILES"  -> tokens [user, profile]   canonical "userprofile"
//! "userProfiles"   -> tokens [user, profile]   canonical "userprofile"
//! "ID_LFC"         -> tokens [id, lifecycle]   (with LFC -> LIFECYCLE seeded)
//! ```
//!
//! The canonical form is only ever used for comparison. Entities keep their
//! original identifiers for display and storage.

mod abbreviations;
mod inflection;

pub use abbreviations::AbbreviationDictionary;
pub use inflection::singularize;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Canonical comparison form of an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NormalizedName {
    tokens: Vec<String>,
    canonical: String,
}

impl NormalizedName {
    fn from_tokens(tokens: Vec<String>) -> Self {
        let canonical = tokens.concat();
        Self { tokens, canonical }
    }

    /// Folded tokens in identifier order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens joined without separators (lowercase).
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// True if the identifier had no alphanumeric content.
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Canonicalizes identifiers: case folding, separator stripping, camelCase
/// splitting, singular folding and abbreviation expansion.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    dictionary: AbbreviationDictionary,
}

impl Normalizer {
    /// A normalizer without abbreviations.
    pub fn new() -> Self {
        Self::default()
    }

    /// A normalizer seeded with an abbreviation dictionary.
    pub fn with_dictionary(dictionary: AbbreviationDictionary) -> Self {
        Self { dictionary }
    }

    /// A normalizer seeded from configured `abbreviation -> expansion` pairs.
    pub fn from_abbreviations(map: &HashMap<String, String>) -> Self {
        Self::with_dictionary(AbbreviationDictionary::from_map(map))
    }

    /// The abbreviation dictionary in use.
    pub fn dictionary(&self) -> &AbbreviationDictionary {
        &self.dictionary
    }

    /// Normalize an identifier.
    pub fn normalize(&self, identifier: &str) -> NormalizedName {
        let folded = fold_tokens(tokenize(identifier));
        NormalizedName::from_tokens(self.dictionary.expand(folded))
    }
}

/// Split an identifier into lowercase word tokens.
///
/// Separators are any non-alphanumeric characters (`_`, `-`, whitespace,
/// `.`). Inside a run, camelCase humps and letter/digit transitions start a
/// new token; an uppercase run followed by a capitalized word is split before
/// the last capital (`HTTPServer` -> `http`, `server`).
pub fn tokenize(identifier: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for chunk in identifier.split(|c: char| !c.is_alphanumeric()) {
        if chunk.is_empty() {
            continue;
        }

        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();

        for (i, &c) in chars.iter().enumerate() {
            if i > 0 && !current.is_empty() {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                let boundary = (prev.is_lowercase() && c.is_uppercase())
                    || (prev.is_alphabetic() && c.is_numeric())
                    || (prev.is_numeric() && c.is_alphabetic())
                    || (prev.is_uppercase()
                        && c.is_uppercase()
                        && next.is_some_and(|n| n.is_lowercase()));
                if boundary {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            current.extend(c.to_lowercase());
        }

        if !current.is_empty() {
            tokens.push(current);
        }
    }

    tokens
}

/// Fold tokens to their singular form.
pub(crate) fn fold_tokens(tokens: Vec<String>) -> Vec<String> {
    tokens.iter().map(|t| singularize(t)).collect()
}
