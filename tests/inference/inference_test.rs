use schemagraph::config::InferenceSettings;
use schemagraph::inference::{InferenceEngine, InferenceStatistics};
use schemagraph::metadata::{RawColumn, RawConstraint, RawTable};
use schemagraph::schema::{RelationshipOrigin, SchemaModel, SchemaModelBuilder};
use std::collections::{BTreeSet, HashMap};

fn model(tables: &[&str], columns: Vec<RawColumn>, constraints: Vec<RawConstraint>) -> SchemaModel {
    let raw: Vec<RawTable> = tables.iter().map(|t| RawTable::new(*t)).collect();
    SchemaModelBuilder::new("main", "test")
        .build(&raw, &columns, &constraints)
        .unwrap()
        .model
}

fn lifecycle_model() -> SchemaModel {
    model(
        &["LIFECYCLE", "USER_PROFILES"],
        vec![
            RawColumn::new("LIFECYCLE", "ID", "NUMBER").primary_key(),
            RawColumn::new("LIFECYCLE", "STAGE", "VARCHAR2"),
            RawColumn::new("USER_PROFILES", "ID", "NUMBER").primary_key(),
            RawColumn::new("USER_PROFILES", "ID_LFC", "NUMBER"),
        ],
        vec![],
    )
}

fn mixed_model() -> SchemaModel {
    model(
        &["LIFECYCLE", "USER_PROFILES", "ORDERS", "SHIPMENTS"],
        vec![
            RawColumn::new("LIFECYCLE", "ID", "NUMBER").primary_key(),
            RawColumn::new("USER_PROFILES", "ID", "NUMBER").primary_key(),
            RawColumn::new("USER_PROFILES", "ID_LFC", "NUMBER"),
            RawColumn::new("ORDERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("SHIPMENTS", "ID", "NUMBER").primary_key(),
            RawColumn::new("SHIPMENTS", "ORDER_ID", "NUMBER"),
            RawColumn::new("SHIPMENTS", "ORDER_STATUS_FK", "NUMBER"),
        ],
        vec![],
    )
}

fn pairs(model: &SchemaModel, threshold: f64) -> BTreeSet<String> {
    InferenceEngine::default()
        .infer(model, threshold, true)
        .relationships
        .iter()
        .map(|r| format!("{} -> {}", r.source, r.target))
        .collect()
}

#[test]
fn test_abbreviated_prefix_column_resolves_table() {
    let outcome = InferenceEngine::default().infer(&lifecycle_model(), 0.7, true);

    assert_eq!(outcome.relationships.len(), 1);
    let rel = &outcome.relationships[0];
    assert_eq!(rel.source.to_string(), "USER_PROFILES.ID_LFC");
    assert_eq!(rel.target.to_string(), "LIFECYCLE.ID");
    assert_eq!(rel.origin, RelationshipOrigin::Inferred);
    assert_eq!(rel.rule.as_deref(), Some("ID_{TABLE}"));
    assert!(rel.confidence >= 0.7 && rel.confidence < 1.0);
    assert_eq!(rel.matched_table.as_deref(), Some("lifecycle"));
    assert_eq!(rel.matched_column.as_deref(), Some("id"));
    assert_eq!(rel.constraint_name.as_deref(), Some("INFERRED_USER_PROFILES_ID_LFC"));
}

#[test]
fn test_column_case_does_not_matter() {
    let lower = model(
        &["lifecycle", "user_profiles"],
        vec![
            RawColumn::new("lifecycle", "id", "NUMBER").primary_key(),
            RawColumn::new("user_profiles", "id", "NUMBER").primary_key(),
            RawColumn::new("user_profiles", "Id_Lfc", "NUMBER"),
        ],
        vec![],
    );
    let upper = InferenceEngine::default().infer(&lifecycle_model(), 0.7, true);
    let mixed = InferenceEngine::default().infer(&lower, 0.7, true);

    assert_eq!(mixed.relationships.len(), 1);
    assert_eq!(mixed.relationships[0].source.column, "Id_Lfc");
    assert_eq!(mixed.relationships[0].target.table, "lifecycle");
    assert_eq!(mixed.relationships[0].confidence, upper.relationships[0].confidence);
}

#[test]
fn test_dictionary_makes_abbreviation_exact() {
    let mut settings = InferenceSettings::default();
    settings.abbreviation_dictionary = HashMap::from([("LFC".to_string(), "LIFECYCLE".to_string())]);
    let engine = InferenceEngine::from_settings(&settings).unwrap();

    let outcome = engine.infer(&lifecycle_model(), 0.95, true);
    assert_eq!(outcome.relationships.len(), 1);
    assert_eq!(outcome.relationships[0].confidence, 1.0);
}

#[test]
fn test_higher_threshold_never_adds_relationships() {
    let m = mixed_model();
    let thresholds = [0.0, 0.5, 0.6, 0.7, 0.75, 0.8, 0.9, 1.0];
    let sets: Vec<BTreeSet<String>> = thresholds.iter().map(|t| pairs(&m, *t)).collect();

    for window in sets.windows(2) {
        assert!(window[1].is_subset(&window[0]), "{:?} not within {:?}", window[1], window[0]);
    }

    let at = |t: f64| pairs(&m, t);
    assert!(at(0.5).contains("SHIPMENTS.ORDER_STATUS_FK -> ORDERS.ID"));
    assert!(!at(0.7).contains("SHIPMENTS.ORDER_STATUS_FK -> ORDERS.ID"));
    assert!(at(0.7).contains("USER_PROFILES.ID_LFC -> LIFECYCLE.ID"));
    assert!(!at(0.8).contains("USER_PROFILES.ID_LFC -> LIFECYCLE.ID"));
    assert_eq!(at(1.0), BTreeSet::from(["SHIPMENTS.ORDER_ID -> ORDERS.ID".to_string()]));
}

#[test]
fn test_partial_table_name_below_threshold_infers_nothing() {
    let m = model(
        &["ORDERS", "SHIPMENTS"],
        vec![
            RawColumn::new("ORDERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("SHIPMENTS", "ID", "NUMBER").primary_key(),
            RawColumn::new("SHIPMENTS", "ORDER_STATUS_FK", "NUMBER"),
        ],
        vec![],
    );
    let outcome = InferenceEngine::default().infer(&m, 0.7, true);
    assert!(outcome.relationships.is_empty());
}

#[test]
fn test_explicit_relationship_not_duplicated() {
    let m = model(
        &["CUSTOMERS", "ORDERS"],
        vec![
            RawColumn::new("CUSTOMERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDERS", "CUSTOMER_ID", "NUMBER"),
        ],
        vec![RawConstraint::new("ORDERS", "CUSTOMER_ID", "CUSTOMERS", "ID")],
    );
    let outcome = InferenceEngine::default().infer(&m, 0.7, true);

    assert!(outcome.relationships.is_empty());
    assert_eq!(m.relationships().len(), 1);
    assert_eq!(m.relationships()[0].origin, RelationshipOrigin::Explicit);
    assert_eq!(m.relationships()[0].confidence, 1.0);
}

#[test]
fn test_own_table_match_is_not_a_relationship() {
    // CUSTOMER.CUSTOMER_ID resolves {TABLE}_ID to its own table.
    let m = model(
        &["CUSTOMER", "CUSTOMER_NOTES"],
        vec![
            RawColumn::new("CUSTOMER", "CUSTOMER_ID", "NUMBER").primary_key(),
            RawColumn::new("CUSTOMER_NOTES", "NOTE_ID", "NUMBER").primary_key(),
            RawColumn::new("CUSTOMER_NOTES", "CUSTOMER_ID", "NUMBER"),
        ],
        vec![],
    );
    let found = pairs(&m, 0.7);
    assert_eq!(
        found,
        BTreeSet::from(["CUSTOMER_NOTES.CUSTOMER_ID -> CUSTOMER.CUSTOMER_ID".to_string()])
    );
}

#[test]
fn test_shared_primary_key_one_to_one() {
    let m = model(
        &["USERS", "USER_SETTINGS"],
        vec![
            RawColumn::new("USERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("USER_SETTINGS", "USER_ID", "NUMBER").primary_key(),
            RawColumn::new("USER_SETTINGS", "THEME", "VARCHAR2"),
        ],
        vec![],
    );
    assert_eq!(
        pairs(&m, 0.7),
        BTreeSet::from(["USER_SETTINGS.USER_ID -> USERS.ID".to_string()])
    );
}

#[test]
fn test_same_input_same_output() {
    let engine = InferenceEngine::default();
    let first = engine.infer(&mixed_model(), 0.5, true);
    for _ in 0..5 {
        let again = engine.infer(&mixed_model(), 0.5, true);
        assert_eq!(again.relationships, first.relationships);
        assert_eq!(again.warnings, first.warnings);
    }
}

#[test]
fn test_statistics_buckets() {
    let outcome = InferenceEngine::default().infer(&mixed_model(), 0.5, true);
    let stats = InferenceStatistics::from_relationships(&outcome.relationships);

    assert_eq!(stats.total, outcome.relationships.len());
    assert_eq!(
        stats.high_confidence + stats.medium_confidence + stats.low_confidence,
        stats.total
    );
    assert!(stats.high_confidence >= 1);
    assert!(stats.low_confidence >= 1);
}
