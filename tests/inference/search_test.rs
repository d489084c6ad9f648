use schemagraph::naming::Normalizer;
use schemagraph::similarity::{MatchKind, SearchCandidate, SimilarityIndex};
use std::collections::HashMap;

fn catalog() -> Vec<SearchCandidate> {
    vec![
        SearchCandidate::table("hr", "USER_INFORMATION"),
        SearchCandidate::column("hr", "USER_INFORMATION", "EMAIL"),
        SearchCandidate::table("sales", "CUSTOMERS"),
        SearchCandidate::column("sales", "CUSTOMERS", "CUSTOMER_NAME"),
        SearchCandidate::table("sales", "ORDERS"),
        SearchCandidate::column("sales", "ORDERS", "ORDER_DATE"),
    ]
}

#[test]
fn test_abbreviated_query_finds_table() {
    let index = SimilarityIndex::default();
    let hits = index.search("usr info", &catalog(), 0.6, None);

    let hit = hits
        .iter()
        .find(|m| m.kind == MatchKind::Table && m.table == "USER_INFORMATION")
        .expect("USER_INFORMATION should match");
    assert!(hit.score >= 0.6);
    assert_eq!(hit.database, "hr");
    assert!(hit.column.is_none());
}

#[test]
fn test_strict_threshold_rejects_abbreviation() {
    let index = SimilarityIndex::default();
    let hits = index.search("usr info", &catalog(), 0.95, None);
    assert!(hits.iter().all(|m| m.table != "USER_INFORMATION"));
}

#[test]
fn test_dictionary_entry_is_exact() {
    let dictionary = HashMap::from([("usr_info".to_string(), "USER_INFORMATION".to_string())]);
    let index = SimilarityIndex::new(Normalizer::from_abbreviations(&dictionary));
    let hits = index.search("usr info", &catalog(), 0.95, None);

    assert_eq!(hits[0].table, "USER_INFORMATION");
    assert_eq!(hits[0].score, 1.0);
}

#[test]
fn test_results_ranked_and_limited() {
    let index = SimilarityIndex::default();
    let hits = index.search("customer", &catalog(), 0.3, None);

    assert!(hits.len() >= 2);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(hits[0].kind, MatchKind::Table);
    assert_eq!(hits[0].table, "CUSTOMERS");
    assert_eq!(hits[0].score, 1.0);

    let limited = index.search("customer", &catalog(), 0.3, Some(1));
    assert_eq!(limited, hits[..1].to_vec());
}

#[test]
fn test_each_query_word_is_tried() {
    let index = SimilarityIndex::default();
    let hits = index.search("latest order", &catalog(), 0.9, None);
    assert!(hits
        .iter()
        .any(|m| m.kind == MatchKind::Table && m.table == "ORDERS"));
}

#[test]
fn test_blank_query_matches_nothing() {
    let index = SimilarityIndex::default();
    assert!(index.search("", &catalog(), 0.0, None).is_empty());
    assert!(index.search(" _ ", &catalog(), 0.0, None).is_empty());
}
