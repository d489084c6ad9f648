//! Naming-convention pattern matcher.
//!
//! A rule is a column-name template with one `{TABLE}` placeholder:
//!
//! | Template      | Column        | Fragment   |
//! |---------------|---------------|------------|
//! | `{TABLE}_ID`  | `CUSTOMER_ID` | `CUSTOMER` |
//! | `ID_{TABLE}`  | `ID_LFC`      | `LFC`      |
//! | `{TABLE}_KEY` | `REGION_KEY`  | `REGION`   |
//! | `{TABLE}_FK`  | `PLAN_FK`     | `PLAN`     |
//!
//! Templates match case-insensitively. The fragment is resolved to the single
//! best-scoring table through the similarity index; the target column is
//! that table's key column.

use once_cell::sync::Lazy;
use regex::Regex;

use super::InferenceAmbiguityWarning;
use crate::config::SettingsError;
use crate::naming::NormalizedName;
use crate::schema::{SchemaModel, Table, TableKey};
use crate::similarity::SimilarityIndex;

const PLACEHOLDER: &str = "{TABLE}";

/// Templates enabled when none are configured.
pub const DEFAULT_TEMPLATES: &[&str] = &["{TABLE}_ID", "ID_{TABLE}", "{TABLE}_KEY", "{TABLE}_FK"];

static DEFAULT_RULES: Lazy<Vec<NamingRule>> = Lazy::new(|| {
    DEFAULT_TEMPLATES
        .iter()
        .filter_map(|t| NamingRule::compile(t).ok())
        .collect()
});

/// A compiled naming template.
#[derive(Debug, Clone)]
pub struct NamingRule {
    template: String,
    regex: Regex,
}

impl NamingRule {
    /// Compile a template such as `{TABLE}_ID`.
    pub fn compile(template: &str) -> Result<Self, SettingsError> {
        let template = template.trim();
        let Some((prefix, suffix)) = template.split_once(PLACEHOLDER) else {
            return Err(SettingsError::InvalidConfig(format!(
                "naming template '{template}' has no {PLACEHOLDER} placeholder"
            )));
        };
        if suffix.contains(PLACEHOLDER) {
            return Err(SettingsError::InvalidConfig(format!(
                "naming template '{template}' has more than one {PLACEHOLDER} placeholder"
            )));
        }

        let pattern = format!(
            "(?i)^{}(?P<table>.+){}$",
            regex::escape(prefix),
            regex::escape(suffix)
        );
        let regex = Regex::new(&pattern)
            .map_err(|e| SettingsError::InvalidConfig(format!("naming template '{template}': {e}")))?;

        Ok(Self {
            template: template.to_string(),
            regex,
        })
    }

    /// The template text, used as the rule name.
    pub fn name(&self) -> &str {
        &self.template
    }

    /// Extract the `{TABLE}` fragment from a column name.
    pub fn fragment<'a>(&self, column: &'a str) -> Option<&'a str> {
        self.regex
            .captures(column)
            .and_then(|c| c.name("table"))
            .map(|m| m.as_str())
            .filter(|f| f.chars().any(char::is_alphanumeric))
    }
}

/// A table prepared for fragment resolution.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub key: TableKey,
    pub name: String,
    pub normalized: NormalizedName,
    /// Key column a reference to this table points at, if any.
    pub target_column: Option<(String, NormalizedName)>,
}

/// A `(target_table, target_column, rule)` candidate for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCandidate {
    pub rule: String,
    /// Position of the rule in the matcher, for tie-breaks.
    pub rule_index: usize,
    pub target_table: String,
    pub target_column: String,
    /// Normalized target table name.
    pub matched_table: String,
    /// Normalized target column name.
    pub matched_column: String,
    /// Table resolution score.
    pub score: f64,
}

/// Candidates and tie-breaks for one column.
#[derive(Debug, Clone, Default)]
pub struct PatternMatches {
    pub candidates: Vec<PatternCandidate>,
    pub ambiguities: Vec<InferenceAmbiguityWarning>,
}

/// Matches column names against naming rules.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<NamingRule>,
    index: SimilarityIndex,
}

impl PatternMatcher {
    /// A matcher with the four default rules.
    pub fn new(index: SimilarityIndex) -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
            index,
        }
    }

    /// A matcher with configured templates, in tie-break order.
    pub fn with_templates<S: AsRef<str>>(
        index: SimilarityIndex,
        templates: &[S],
    ) -> Result<Self, SettingsError> {
        let rules = templates
            .iter()
            .map(|t| NamingRule::compile(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, index })
    }

    pub fn rules(&self) -> &[NamingRule] {
        &self.rules
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Normalize every table of the model and resolve its key column.
    pub fn prepare(&self, model: &SchemaModel) -> Vec<TableEntry> {
        model
            .tables()
            .map(|table| {
                let normalized = self.index.normalize(&table.name);
                let target_column = self
                    .target_column(table, &normalized)
                    .map(|c| (c.to_string(), self.index.normalize(c)));
                TableEntry {
                    key: table.key(),
                    name: table.name.clone(),
                    normalized,
                    target_column,
                }
            })
            .collect()
    }

    /// Key column of `table`: declared primary key (lowest ordinal), else a
    /// column named `ID`, else `{TABLE}_ID` / `ID_{TABLE}` / `{TABLE}ID`.
    fn target_column<'t>(&self, table: &'t Table, normalized: &NormalizedName) -> Option<&'t str> {
        if let Some(pk) = table.primary_key().next() {
            return Some(&pk.name);
        }
        if let Some(id) = table.column("ID") {
            return Some(&id.name);
        }

        let base = normalized.as_str();
        if base.is_empty() {
            return None;
        }
        let suffixed = format!("{base}id");
        let prefixed = format!("id{base}");
        table
            .columns
            .iter()
            .find(|c| {
                let n = self.index.normalize(&c.name);
                n.as_str() == suffixed || n.as_str() == prefixed
            })
            .map(|c| c.name.as_str())
    }

    /// Run every rule against `column` of `source`.
    ///
    /// Each matching rule resolves its fragment to the best-scoring table over
    /// all `tables`. A rule fires only when that score is at least `threshold`
    /// and the winner is neither `source` itself nor a table without a key
    /// column.
    pub fn match_column(
        &self,
        source: &Table,
        column: &str,
        tables: &[TableEntry],
        threshold: f64,
    ) -> PatternMatches {
        let source_key = source.key();
        let mut out = PatternMatches::default();

        for (rule_index, rule) in self.rules.iter().enumerate() {
            let Some(fragment) = rule.fragment(column) else {
                continue;
            };
            let fragment = self.index.normalize(fragment);
            if fragment.is_empty() {
                continue;
            }

            let Some((best, score, tied)) = self.resolve(&fragment, tables) else {
                continue;
            };
            if score < threshold {
                continue;
            }
            if !tied.is_empty() {
                out.ambiguities.push(InferenceAmbiguityWarning {
                    table: source.name.clone(),
                    column: column.to_string(),
                    rule: Some(rule.name().to_string()),
                    chosen: best.name.clone(),
                    tied: tied.iter().map(|t| t.name.clone()).collect(),
                    score,
                });
            }
            if best.key == source_key {
                continue;
            }
            let Some((target_column, target_normalized)) = &best.target_column else {
                continue;
            };

            out.candidates.push(PatternCandidate {
                rule: rule.name().to_string(),
                rule_index,
                target_table: best.name.clone(),
                target_column: target_column.clone(),
                matched_table: best.normalized.to_string(),
                matched_column: target_normalized.to_string(),
                score,
            });
        }

        out
    }

    /// Best table for a fragment: highest score, then smallest normalized
    /// name. Returns the other tables sharing the top score.
    fn resolve<'e>(
        &self,
        fragment: &NormalizedName,
        tables: &'e [TableEntry],
    ) -> Option<(&'e TableEntry, f64, Vec<&'e TableEntry>)> {
        let mut best: Option<(&TableEntry, f64)> = None;
        let mut tied: Vec<&TableEntry> = Vec::new();

        for entry in tables {
            let score = self.index.score_normalized(fragment, &entry.normalized);
            match best {
                None => best = Some((entry, score)),
                Some((current, top)) => {
                    if score > top {
                        best = Some((entry, score));
                        tied.clear();
                    } else if score == top {
                        if (&entry.normalized, &entry.key) < (&current.normalized, &current.key) {
                            tied.push(current);
                            best = Some((entry, score));
                        } else {
                            tied.push(entry);
                        }
                    }
                }
            }
        }

        best.map(|(entry, score)| (entry, score, tied))
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(SimilarityIndex::default())
    }
}
