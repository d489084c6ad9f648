//! Foreign-key inference from column naming.
//!
//! The engine runs in two steps per column:
//!
//! 1. **Pattern matching** - naming rules extract a table fragment from the
//!    column name and resolve it to the best-scoring table.
//! 2. **Selection** - the strongest candidate wins; candidates that duplicate
//!    an explicit or stronger inferred relationship are dropped.
//!
//! # Example
//!
//! ```ignore
//! use schemagraph::inference::InferenceEngine;
//!
//! let engine = InferenceEngine::default();
//! let outcome = engine.infer(&model, 0.7, true);
//! ```

mod engine;
pub mod patterns;

pub use engine::{InferenceEngine, InferenceOutcome};
pub use patterns::{NamingRule, PatternCandidate, PatternMatcher};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::Relationship;

/// Confidence bucket boundaries for inferred relationships.
pub mod thresholds {
    /// At or above: high confidence.
    pub const HIGH: f64 = 0.9;
    /// At or above (and below [`HIGH`]): medium confidence.
    pub const MEDIUM: f64 = 0.7;
}

/// Recorded whenever a tie between equally scored candidates is broken.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("Ambiguous match for {table}.{column}: chose {chosen} over {tied:?} at {score:.3}")]
pub struct InferenceAmbiguityWarning {
    pub table: String,
    pub column: String,
    /// Rule whose fragment was ambiguous; `None` when rules tied each other.
    pub rule: Option<String>,
    pub chosen: String,
    pub tied: Vec<String>,
    pub score: f64,
}

/// Summary of inferred relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStatistics {
    pub total: usize,
    /// Confidence >= 0.9.
    pub high_confidence: usize,
    /// 0.7 <= confidence < 0.9.
    pub medium_confidence: usize,
    /// Confidence < 0.7.
    pub low_confidence: usize,
    pub average_confidence: f64,
    pub by_rule: BTreeMap<String, usize>,
}

impl InferenceStatistics {
    /// Tally inferred relationships; explicit ones are ignored.
    pub fn from_relationships<'a, I>(relationships: I) -> Self
    where
        I: IntoIterator<Item = &'a Relationship>,
    {
        let mut stats = Self::default();
        let mut sum = 0.0;

        for rel in relationships.into_iter().filter(|r| r.is_inferred()) {
            stats.total += 1;
            sum += rel.confidence;
            if rel.confidence >= thresholds::HIGH {
                stats.high_confidence += 1;
            } else if rel.confidence >= thresholds::MEDIUM {
                stats.medium_confidence += 1;
            } else {
                stats.low_confidence += 1;
            }
            let rule = rel.rule.clone().unwrap_or_else(|| "unknown".to_string());
            *stats.by_rule.entry(rule).or_default() += 1;
        }

        if stats.total > 0 {
            stats.average_confidence = sum / stats.total as f64;
        }
        stats
    }
}
