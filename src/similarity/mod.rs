//! Bounded, symmetric similarity between identifiers.
//!
//! The score of two identifiers is the best of:
//!
//! - exact match of the normalized forms (1.0),
//! - indel ratio of the canonical strings,
//! - abbreviation score (`LFC` vs `LIFECYCLE`), token-aligned when both sides
//!   have the same number of words.
//!
//! The index never applies a cutoff of its own; callers pass thresholds.

pub mod metric;
mod search;

pub use search::{MatchKind, SchemaMatch, SearchCandidate};

use crate::naming::{NormalizedName, Normalizer};

use metric::{abbreviation_score, indel_ratio};

/// Similarity scoring over normalized identifiers.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    normalizer: Normalizer,
}

impl SimilarityIndex {
    /// Create an index over the given normalizer.
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// The normalizer used for both sides of every comparison.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalize an identifier with this index's normalizer.
    pub fn normalize(&self, identifier: &str) -> NormalizedName {
        self.normalizer.normalize(identifier)
    }

    /// Similarity of two raw identifiers in [0, 1].
    pub fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        self.score_normalized(&self.normalize(a), &self.normalize(b))
    }

    /// Similarity of two already-normalized identifiers in [0, 1].
    pub fn score_normalized(&self, a: &NormalizedName, b: &NormalizedName) -> f64 {
        if a.as_str() == b.as_str() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let edit = indel_ratio(a.as_str(), b.as_str());
        let abbreviation = token_abbreviation(a, b);

        edit.max(abbreviation).clamp(0.0, 1.0)
    }
}

/// Abbreviation-aware score. Same word count: average per-word score.
/// Otherwise the shorter canonical string must abbreviate the longer word list.
fn token_abbreviation(a: &NormalizedName, b: &NormalizedName) -> f64 {
    let (ta, tb) = (a.tokens(), b.tokens());

    if ta.len() == tb.len() {
        let total: f64 = ta.iter().zip(tb).map(|(x, y)| word_score(x, y)).sum();
        return total / ta.len() as f64;
    }

    let (short, long) = if a.as_str().len() <= b.as_str().len() {
        (a, b)
    } else {
        (b, a)
    };
    abbreviation_score(short.as_str(), long.tokens())
}

fn word_score(x: &str, y: &str) -> f64 {
    if x == y {
        return 1.0;
    }
    let (short, long) = if x.len() <= y.len() { (x, y) } else { (y, x) };
    let abbreviation = abbreviation_score(short, std::slice::from_ref(&long.to_string()));
    abbreviation.max(indel_ratio(x, y))
}
