use async_trait::async_trait;
use schemagraph::config::{Settings, DEFAULT_NAMESPACE};
use schemagraph::metadata::{
    MetadataProvider, MetadataResult, MetadataSnapshot, RawColumn, RawConstraint, RawTable,
    SnapshotProvider,
};
use schemagraph::schema::{MalformedMetadataError, RelationshipOrigin};
use schemagraph::similarity::MatchKind;
use schemagraph::store::SqliteGraphStore;
use schemagraph::{Error, IntrospectionWarning, SchemaGraphService};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn shop() -> MetadataSnapshot {
    MetadataSnapshot {
        tables: vec![
            RawTable::new("CUSTOMERS").with_schema("SALES").with_row_count(120),
            RawTable::new("ORDERS").with_schema("SALES"),
            RawTable::new("PRODUCTS").with_schema("SALES"),
            RawTable::new("ORDER_ITEMS").with_schema("SALES"),
        ],
        columns: vec![
            RawColumn::new("CUSTOMERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("CUSTOMERS", "NAME", "VARCHAR2"),
            RawColumn::new("ORDERS", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDERS", "CUSTOMER_ID", "NUMBER").not_null(),
            RawColumn::new("PRODUCTS", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDER_ITEMS", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDER_ITEMS", "ORDER_ID", "NUMBER"),
            RawColumn::new("ORDER_ITEMS", "PRODUCT_KEY", "NUMBER"),
        ],
        constraints: vec![RawConstraint::new("ORDERS", "CUSTOMER_ID", "CUSTOMERS", "ID")],
    }
}

fn staff() -> MetadataSnapshot {
    MetadataSnapshot {
        tables: vec![RawTable::new("EMPLOYEES"), RawTable::new("DEPARTMENTS")],
        columns: vec![
            RawColumn::new("EMPLOYEES", "ID", "NUMBER").primary_key(),
            RawColumn::new("EMPLOYEES", "DEPARTMENT_ID", "NUMBER"),
            RawColumn::new("DEPARTMENTS", "ID", "NUMBER").primary_key(),
        ],
        constraints: vec![],
    }
}

fn service(settings: Settings) -> SchemaGraphService {
    SchemaGraphService::new(settings, SqliteGraphStore::open_in_memory().unwrap()).unwrap()
}

/// Blocks in `list_tables` until released.
struct GatedProvider {
    inner: SnapshotProvider,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl MetadataProvider for GatedProvider {
    fn source_name(&self) -> &str {
        self.inner.source_name()
    }

    async fn list_tables(&self, schema_filter: Option<&str>) -> MetadataResult<Vec<RawTable>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.list_tables(schema_filter).await
    }

    async fn list_columns(&self, table: &RawTable) -> MetadataResult<Vec<RawColumn>> {
        self.inner.list_columns(table).await
    }

    async fn list_foreign_keys(&self, table: &RawTable) -> MetadataResult<Vec<RawConstraint>> {
        self.inner.list_foreign_keys(table).await
    }
}

#[tokio::test]
async fn test_introspect_builds_graph() {
    let svc = service(Settings::default());
    let provider = SnapshotProvider::new("shop.json", shop());

    let report = svc
        .introspect(&provider, Some("sales"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.database, "sales");
    assert_eq!(report.namespace, "sales");
    assert_eq!(report.source, "shop.json");
    assert_eq!(report.tables, 4);
    assert_eq!(report.columns, 8);
    assert_eq!(report.explicit_relationships, 1);
    assert_eq!(report.inferred_relationships, 2);
    assert!(!report.model_unchanged);
    assert!(report.warnings.is_empty());

    // 1 database + 4 tables + 8 columns
    assert_eq!(report.store.nodes_inserted, 13);
    // 4 HAS_TABLE + 8 HAS_COLUMN + 3 HAS_FOREIGN_KEY
    assert_eq!(report.store.edges_inserted, 15);
    assert_eq!(svc.store().node_count(Some("sales")).unwrap(), 13);
}

#[tokio::test]
async fn test_reintrospection_is_idempotent() {
    let svc = service(Settings::default());
    let provider = SnapshotProvider::new("shop.json", shop());
    let cancel = CancellationToken::new();

    let first = svc.introspect(&provider, Some("sales"), None, &cancel).await.unwrap();
    let second = svc.introspect(&provider, Some("sales"), None, &cancel).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.content_hash, second.content_hash);
    assert!(second.model_unchanged);
    assert!(second.store.is_noop());
    assert_eq!(second.store.nodes_unchanged, 13);
    assert_eq!(second.store.edges_unchanged, 15);
    assert_eq!(svc.store().last_run("sales").unwrap().unwrap().run_id, second.run_id);
}

#[tokio::test]
async fn test_changed_catalog_replaces_namespace() {
    let svc = service(Settings::default());
    let cancel = CancellationToken::new();
    svc.introspect(&SnapshotProvider::new("v1", shop()), Some("sales"), None, &cancel)
        .await
        .unwrap();

    let mut smaller = shop();
    smaller.tables.retain(|t| t.name != "PRODUCTS");
    smaller.columns.retain(|c| c.table != "PRODUCTS");
    let report = svc
        .introspect(&SnapshotProvider::new("v2", smaller), Some("sales"), None, &cancel)
        .await
        .unwrap();

    assert!(!report.model_unchanged);
    assert_eq!(report.inferred_relationships, 1);
    // PRODUCTS table and its column
    assert_eq!(report.store.nodes_removed, 2);
    // HAS_TABLE, HAS_COLUMN and the inferred PRODUCT_KEY edge
    assert_eq!(report.store.edges_removed, 3);
    assert!(svc.context(&["PRODUCTS".to_string()]).await.unwrap().tables.is_empty());
}

#[tokio::test]
async fn test_databases_live_in_separate_namespaces() {
    let svc = service(Settings::default());
    let cancel = CancellationToken::new();
    svc.introspect(&SnapshotProvider::new("a", shop()), Some("sales"), None, &cancel)
        .await
        .unwrap();
    svc.introspect(&SnapshotProvider::new("b", staff()), Some("hr"), None, &cancel)
        .await
        .unwrap();

    let namespaces: Vec<String> = svc
        .store()
        .namespaces()
        .unwrap()
        .into_iter()
        .map(|r| r.namespace)
        .collect();
    assert_eq!(namespaces, vec!["hr", "sales"]);
    assert_eq!(svc.store().node_count(Some("sales")).unwrap(), 13);
}

#[tokio::test]
async fn test_single_namespace_mode_replaces_previous_database() {
    let mut settings = Settings::default();
    settings.store.support_multiple_databases = false;
    let svc = service(settings);
    let cancel = CancellationToken::new();

    svc.introspect(&SnapshotProvider::new("a", shop()), Some("sales"), None, &cancel)
        .await
        .unwrap();
    let report = svc
        .introspect(&SnapshotProvider::new("b", staff()), Some("hr"), None, &cancel)
        .await
        .unwrap();

    assert_eq!(report.namespace, DEFAULT_NAMESPACE);
    let runs = svc.store().namespaces().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].database, "hr");

    let context = svc
        .context(&["ORDERS".to_string(), "EMPLOYEES".to_string()])
        .await
        .unwrap();
    assert_eq!(context.missing, vec!["ORDERS".to_string()]);
    assert_eq!(context.tables.len(), 1);
}

#[tokio::test]
async fn test_default_database_name() {
    let svc = service(Settings::default());
    let report = svc
        .introspect(&SnapshotProvider::new("a", staff()), None, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.database, "oracle_main");
    assert_eq!(report.namespace, "oracle_main");
}

#[tokio::test]
async fn test_schema_filter() {
    let svc = service(Settings::default());
    let mut snapshot = shop();
    snapshot.tables.push(RawTable::new("AUDIT_LOG").with_schema("SYS"));
    let report = svc
        .introspect(
            &SnapshotProvider::new("a", snapshot),
            Some("sales"),
            Some("sales"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.tables, 4);
}

#[tokio::test]
async fn test_zero_tables_is_fatal() {
    let svc = service(Settings::default());
    let provider = SnapshotProvider::new("empty", MetadataSnapshot::default());

    let err = svc
        .introspect(&provider, Some("sales"), None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Malformed(MalformedMetadataError::NoTables { .. })));
    assert!(svc.store().last_run("sales").unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_rows_become_warnings() {
    let svc = service(Settings::default());
    let mut snapshot = shop();
    snapshot.columns.push(RawColumn::new("ORDERS", " ", "NUMBER"));
    snapshot.constraints.push(RawConstraint::new("ORDERS", "ID", "INVOICES", "ID"));

    let report = svc
        .introspect(
            &SnapshotProvider::new("a", snapshot),
            Some("sales"),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.tables, 4);
    assert_eq!(report.explicit_relationships, 1);
    let malformed = report
        .warnings
        .iter()
        .filter(|w| matches!(w, IntrospectionWarning::MalformedMetadata(_)))
        .count();
    assert_eq!(malformed, 2);
}

#[tokio::test]
async fn test_colliding_column_ids_do_not_abort_run() {
    // ORDER.ITEM_ID and ORDER_ITEM.ID share the node id main_column_ORDER_ITEM_ID.
    let svc = service(Settings::default());
    let snapshot = MetadataSnapshot {
        tables: vec![RawTable::new("ORDER"), RawTable::new("ORDER_ITEM")],
        columns: vec![
            RawColumn::new("ORDER", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDER", "ITEM_ID", "NUMBER"),
            RawColumn::new("ORDER_ITEM", "ID", "NUMBER").primary_key(),
            RawColumn::new("ORDER_ITEM", "ORDER_ID", "NUMBER"),
        ],
        constraints: vec![],
    };

    let report = svc
        .introspect(
            &SnapshotProvider::new("a", snapshot),
            Some("main"),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.tables, 2);
    assert_eq!(report.columns, 3);
    assert!(report.warnings.contains(&IntrospectionWarning::MalformedMetadata(
        MalformedMetadataError::ColumnIdCollision {
            table: "ORDER_ITEM".into(),
            column: "ID".into(),
            existing: "ORDER.ITEM_ID".into(),
        }
    )));
}

#[tokio::test]
async fn test_cancelled_run_commits_nothing() {
    let svc = service(Settings::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = svc
        .introspect(&SnapshotProvider::new("a", shop()), Some("sales"), None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled(ref ns) if ns == "sales"));
    assert_eq!(svc.store().node_count(None).unwrap(), 0);
    assert!(svc.store().last_run("sales").unwrap().is_none());
    assert!(!svc.locks().is_locked("sales"));
}

#[tokio::test]
async fn test_concurrent_run_on_same_namespace_fails_fast() {
    let svc = Arc::new(service(Settings::default()));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let gated = Arc::new(GatedProvider {
        inner: SnapshotProvider::new("gated", shop()),
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    });

    let first = {
        let svc = Arc::clone(&svc);
        let gated = Arc::clone(&gated);
        tokio::spawn(async move {
            svc.introspect(gated.as_ref(), Some("sales"), None, &CancellationToken::new())
                .await
        })
    };
    entered.notified().await;
    assert!(svc.locks().is_locked("sales"));

    let busy = svc
        .introspect(
            &SnapshotProvider::new("other", shop()),
            Some("sales"),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(busy, Error::NamespaceLocked(ref ns) if ns == "sales"));

    // Other namespaces are not blocked.
    svc.introspect(
        &SnapshotProvider::new("other", staff()),
        Some("hr"),
        None,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    release.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.source, "gated");
    assert!(!svc.locks().is_locked("sales"));
}

#[tokio::test]
async fn test_context_query() {
    let svc = service(Settings::default());
    svc.introspect(
        &SnapshotProvider::new("a", shop()),
        Some("sales"),
        None,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let context = svc
        .context(&["orders".to_string(), "NOPE".to_string()])
        .await
        .unwrap();

    assert_eq!(context.missing, vec!["NOPE".to_string()]);
    assert_eq!(context.tables.len(), 1);
    let orders = &context.tables[0];
    assert_eq!(orders.namespace, "sales");
    assert_eq!(orders.table.name, "ORDERS");
    let columns: Vec<&str> = orders.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["ID", "CUSTOMER_ID"]);
    assert!(orders.columns[1].is_foreign_key);
    assert!(!orders.columns[1].nullable);

    let mut pairs: Vec<(String, RelationshipOrigin)> = context
        .relationships
        .iter()
        .map(|r| {
            (
                format!("{} -> {}", r.relationship.source, r.relationship.target),
                r.relationship.origin,
            )
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        pairs,
        vec![
            ("ORDERS.CUSTOMER_ID -> CUSTOMERS.ID".to_string(), RelationshipOrigin::Explicit),
            ("ORDER_ITEMS.ORDER_ID -> ORDERS.ID".to_string(), RelationshipOrigin::Inferred),
        ]
    );
}

#[tokio::test]
async fn test_inferred_queries() {
    let svc = service(Settings::default());
    svc.introspect(
        &SnapshotProvider::new("a", shop()),
        Some("sales"),
        None,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let inferred = svc.inferred_relationships().await.unwrap();
    assert_eq!(inferred.len(), 2);
    assert!(inferred.iter().all(|r| r.relationship.is_inferred()));
    assert!(inferred
        .windows(2)
        .all(|w| w[0].relationship.confidence >= w[1].relationship.confidence));

    let stats = svc.inferred_statistics().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.high_confidence, 2);
    assert_eq!(stats.by_rule.values().sum::<usize>(), 2);
}

#[tokio::test]
async fn test_disabled_inference_stores_explicit_only() {
    let mut settings = Settings::default();
    settings.inference.enable_fk_inference = false;
    let svc = service(settings);
    let report = svc
        .introspect(
            &SnapshotProvider::new("a", shop()),
            Some("sales"),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.inferred_relationships, 0);
    assert!(svc.inferred_relationships().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_over_stored_graph() {
    let svc = service(Settings::default());
    svc.introspect(
        &SnapshotProvider::new("a", shop()),
        Some("sales"),
        None,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let hits = svc.search("order items", None).await.unwrap();
    let exact: Vec<(MatchKind, &str)> = hits
        .iter()
        .filter(|m| m.score == 1.0)
        .map(|m| (m.kind, m.table.as_str()))
        .collect();
    assert_eq!(
        exact,
        vec![(MatchKind::Table, "ORDERS"), (MatchKind::Table, "ORDER_ITEMS")]
    );

    assert!(svc.search("warehouse", Some(0.9)).await.unwrap().is_empty());
}
