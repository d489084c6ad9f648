//! Singular/plural folding for identifier tokens.
//!
//! Table names are usually plural (`CUSTOMERS`) while the fragments embedded
//! in FK column names are singular (`CUSTOMER_ID`). Tokens are folded to their
//! singular form before comparison. Uses the `inflector` crate with an
//! override table for irregular plurals common in database schemas.

use inflector::Inflector;

/// Irregular plurals that inflector gets wrong (or that read oddly) in schemas.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("half", "halves"),
    ("analysis", "analyses"),
    ("diagnosis", "diagnoses"),
    ("criterion", "criteria"),
    ("index", "indices"),
    ("appendix", "appendices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
];

/// Tokens that end in `s` but are not plurals in schema vocabulary.
static INVARIANT_TOKENS: &[&str] = &[
    "status", "address", "alias", "series", "species", "news", "access", "class", "process",
    "business", "bonus", "census", "canvas", "analysis", "basis", "axis", "plus", "gas", "sms",
    "data", "metadata",
];

/// Tokens shorter than this are left untouched (`ID`, `FK`, `LFC`, `USR`).
const MIN_INFLECTABLE_LEN: usize = 4;

/// Singularize a lowercase token.
///
/// Short tokens and known invariants are returned as-is so abbreviations
/// like `usr` or `lfc` survive normalization intact.
pub fn singularize(token: &str) -> String {
    if token.len() < MIN_INFLECTABLE_LEN {
        return token.to_string();
    }

    let lower = token.to_lowercase();

    if INVARIANT_TOKENS.contains(&lower.as_str()) {
        return lower;
    }

    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *plural || lower == *singular {
            return singular.to_string();
        }
    }

    if !lower.ends_with('s') {
        return lower;
    }

    lower.to_singular()
}
