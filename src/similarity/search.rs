//! Ranked fuzzy search over table and column names.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::SimilarityIndex;
use crate::naming::NormalizedName;

/// What a search hit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Table,
    Column,
}

/// A searchable table or column.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub kind: MatchKind,
    pub database: String,
    pub table: String,
    pub column: Option<String>,
}

impl SearchCandidate {
    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Table,
            database: database.into(),
            table: table.into(),
            column: None,
        }
    }

    pub fn column(
        database: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            kind: MatchKind::Column,
            database: database.into(),
            table: table.into(),
            column: Some(column.into()),
        }
    }

    /// The identifier the query is scored against.
    pub fn name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.table)
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMatch {
    pub kind: MatchKind,
    pub database: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub score: f64,
}

impl SimilarityIndex {
    /// Score every candidate against `query` and return those at or above
    /// `threshold`, best first.
    ///
    /// The query is scored as a whole and also word by word and by adjacent
    /// word pairs; a candidate keeps its best score. Ties are ordered by
    /// database, table and column name.
    pub fn search<'a, I>(
        &self,
        query: &str,
        candidates: I,
        threshold: f64,
        limit: Option<usize>,
    ) -> Vec<SchemaMatch>
    where
        I: IntoIterator<Item = &'a SearchCandidate>,
    {
        let variants = self.query_variants(query);
        if variants.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<SchemaMatch> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let name = self.normalize(candidate.name());
                let score = variants
                    .iter()
                    .map(|v| self.score_normalized(v, &name))
                    .fold(0.0_f64, f64::max);
                (score >= threshold).then(|| SchemaMatch {
                    kind: candidate.kind,
                    database: candidate.database.clone(),
                    table: candidate.table.clone(),
                    column: candidate.column.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(compare_matches);
        if let Some(limit) = limit {
            matches.truncate(limit);
        }
        matches
    }

    fn query_variants(&self, query: &str) -> Vec<NormalizedName> {
        let words: Vec<&str> = query.split_whitespace().collect();
        let mut raw: Vec<String> = vec![query.trim().to_string()];
        if words.len() > 1 {
            raw.extend(words.iter().map(|w| w.to_string()));
            raw.extend(words.windows(2).map(|pair| pair.join(" ")));
        }

        let mut variants: Vec<NormalizedName> = raw
            .iter()
            .map(|r| self.normalize(r))
            .filter(|n| !n.is_empty())
            .collect();
        variants.sort();
        variants.dedup();
        variants
    }
}

fn compare_matches(a: &SchemaMatch, b: &SchemaMatch) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.database.cmp(&b.database))
        .then_with(|| a.table.cmp(&b.table))
        .then_with(|| a.column.cmp(&b.column))
}
