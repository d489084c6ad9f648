//! Relationship inference engine.
//!
//! Pure function of the model: tables are visited in identity order and
//! columns in ordinal order, so identical input yields identical output.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::patterns::{PatternCandidate, PatternMatcher};
use super::InferenceAmbiguityWarning;
use crate::config::{InferenceSettings, SettingsError};
use crate::naming::Normalizer;
use crate::schema::{
    ColumnKey, ColumnRef, Relationship, RelationshipKey, RelationshipOrigin, SchemaModel,
};
use crate::similarity::SimilarityIndex;

/// Inferred relationships of one model plus the tie-breaks made on the way.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutcome {
    pub relationships: Vec<Relationship>,
    pub warnings: Vec<InferenceAmbiguityWarning>,
}

/// Infers foreign keys that the catalog does not declare.
#[derive(Debug, Clone, Default)]
pub struct InferenceEngine {
    matcher: PatternMatcher,
}

impl InferenceEngine {
    pub fn new(matcher: PatternMatcher) -> Self {
        Self { matcher }
    }

    /// Engine configured from `[inference]` settings.
    pub fn from_settings(settings: &InferenceSettings) -> Result<Self, SettingsError> {
        let index =
            SimilarityIndex::new(Normalizer::from_abbreviations(&settings.abbreviation_dictionary));
        let matcher = PatternMatcher::with_templates(index, &settings.patterns)?;
        Ok(Self::new(matcher))
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Infer relationships for `model`.
    ///
    /// Only candidates whose table resolution score is at least `threshold`
    /// are kept. Returns nothing when `enabled` is false.
    pub fn infer(&self, model: &SchemaModel, threshold: f64, enabled: bool) -> InferenceOutcome {
        let mut outcome = InferenceOutcome::default();
        if !enabled {
            return outcome;
        }

        let explicit_sources: HashSet<ColumnKey> = model
            .relationships()
            .iter()
            .map(|r| r.source.key())
            .collect();
        let explicit_pairs: HashSet<RelationshipKey> =
            model.relationships().iter().map(Relationship::key).collect();

        let entries = self.matcher.prepare(model);
        let mut chosen: Vec<Relationship> = Vec::new();
        let mut by_pair: HashMap<RelationshipKey, usize> = HashMap::new();

        for table in model.tables() {
            for column in &table.columns {
                if explicit_sources.contains(&ColumnKey::new(&table.name, &column.name)) {
                    continue;
                }

                let matches = self
                    .matcher
                    .match_column(table, &column.name, &entries, threshold);
                outcome.warnings.extend(matches.ambiguities);

                let Some(best) = select(&matches.candidates, &table.name, &column.name, &mut outcome.warnings)
                else {
                    continue;
                };

                let relationship = Relationship {
                    source: ColumnRef::new(table.name.clone(), column.name.clone()),
                    target: ColumnRef::new(best.target_table.clone(), best.target_column.clone()),
                    origin: RelationshipOrigin::Inferred,
                    confidence: best.score,
                    rule: Some(best.rule.clone()),
                    matched_table: Some(best.matched_table.clone()),
                    matched_column: Some(best.matched_column.clone()),
                    constraint_name: Some(format!("INFERRED_{}_{}", table.name, column.name)),
                };

                let key = relationship.key();
                if explicit_pairs.contains(&key) {
                    debug!(
                        source = %relationship.source,
                        target = %relationship.target,
                        "inferred relationship duplicates an explicit one"
                    );
                    continue;
                }

                // Among inferred duplicates of one pair the stronger survives.
                match by_pair.get(&key) {
                    Some(&slot) => {
                        if relationship.confidence > chosen[slot].confidence {
                            chosen[slot] = relationship;
                        }
                    }
                    None => {
                        by_pair.insert(key, chosen.len());
                        chosen.push(relationship);
                    }
                }
            }
        }

        for rel in &chosen {
            debug!(
                source = %rel.source,
                target = %rel.target,
                confidence = rel.confidence,
                rule = rel.rule.as_deref().unwrap_or_default(),
                "inferred relationship"
            );
        }

        outcome.relationships = chosen;
        outcome
    }
}

/// Highest score wins; ties break by normalized table name, then rule order.
fn select<'c>(
    candidates: &'c [PatternCandidate],
    table: &str,
    column: &str,
    warnings: &mut Vec<InferenceAmbiguityWarning>,
) -> Option<&'c PatternCandidate> {
    let best = candidates.iter().min_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.matched_table.cmp(&b.matched_table))
            .then_with(|| a.rule_index.cmp(&b.rule_index))
    })?;

    let tied: Vec<String> = candidates
        .iter()
        .filter(|c| c.score == best.score && c.target_table != best.target_table)
        .map(|c| c.target_table.clone())
        .collect();
    if !tied.is_empty() {
        warnings.push(InferenceAmbiguityWarning {
            table: table.to_string(),
            column: column.to_string(),
            rule: None,
            chosen: best.target_table.clone(),
            tied,
            score: best.score,
        });
    }

    Some(best)
}
