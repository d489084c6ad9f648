//! Service operations over the schema graph.
//!
//! ```text
//! introspect(database, schema_filter)
//!   ├─ lock namespace (fail fast)
//!   ├─ MetadataProvider: list tables, then columns + FKs per table (bounded)
//!   ├─ SchemaModelBuilder → InferenceEngine → SchemaGraph (validation)
//!   └─ SqliteGraphStore::upsert (one transaction)
//!
//! search / context / inferred_relationships / inferred_statistics
//!   └─ read-only queries against the store
//! ```
//!
//! A [`CancellationToken`] is checked between per-table units and once more
//! before commit. A cancelled run commits nothing.

mod locks;

pub use locks::{NamespaceGuard, NamespaceLocks};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{Error, IntrospectionWarning, Result};
use crate::graph::SchemaGraph;
use crate::inference::{InferenceEngine, InferenceStatistics};
use crate::metadata::{MetadataProvider, RawColumn, RawConstraint, RawTable};
use crate::naming::Normalizer;
use crate::schema::SchemaModelBuilder;
use crate::similarity::{SchemaMatch, SimilarityIndex};
use crate::store::{
    RunRecord, SchemaContext, SqliteGraphStore, StoreError, StoredRelationship, UpsertSummary,
};

/// Outcome of a committed introspection run.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionReport {
    pub run_id: String,
    pub database: String,
    pub namespace: String,
    pub source: String,
    pub tables: usize,
    pub columns: usize,
    pub explicit_relationships: usize,
    pub inferred_relationships: usize,
    pub content_hash: String,
    /// The model hash equals the previous run's.
    pub model_unchanged: bool,
    pub store: UpsertSummary,
    pub warnings: Vec<IntrospectionWarning>,
}

/// Entry point for introspection and graph queries.
#[derive(Debug)]
pub struct SchemaGraphService {
    settings: Settings,
    store: Arc<SqliteGraphStore>,
    engine: InferenceEngine,
    index: Arc<SimilarityIndex>,
    locks: NamespaceLocks,
}

impl SchemaGraphService {
    /// Create a service over an opened store.
    pub fn new(settings: Settings, store: SqliteGraphStore) -> Result<Self> {
        settings.validate()?;
        let engine = InferenceEngine::from_settings(&settings.inference)?;
        let index = SimilarityIndex::new(Normalizer::from_abbreviations(
            &settings.inference.abbreviation_dictionary,
        ));
        Ok(Self {
            settings,
            store: Arc::new(store),
            engine,
            index: Arc::new(index),
            locks: NamespaceLocks::new(),
        })
    }

    /// Open the store configured in `settings.store`.
    pub fn open(settings: Settings) -> Result<Self> {
        let path = settings.store.resolved_path()?;
        let store = SqliteGraphStore::open(&path)?;
        Self::new(settings, store)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SqliteGraphStore {
        &self.store
    }

    pub fn locks(&self) -> &NamespaceLocks {
        &self.locks
    }

    // ===== Introspection =====

    /// Introspect one database and replace its namespace in the store.
    ///
    /// `database_name` defaults to `store.default_database_name`.
    pub async fn introspect<P>(
        &self,
        provider: &P,
        database_name: Option<&str>,
        schema_filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<IntrospectionReport>
    where
        P: MetadataProvider + ?Sized,
    {
        let database = database_name
            .map(str::to_string)
            .unwrap_or_else(|| self.settings.store.default_database_name.clone());
        let namespace = self.settings.store.namespace_for(&database);

        let _guard = self
            .locks
            .try_acquire(&namespace)
            .ok_or_else(|| Error::NamespaceLocked(namespace.clone()))?;

        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, %database, %namespace, source = provider.source_name(), "introspection started");

        let (raw_tables, raw_columns, raw_constraints) =
            self.fetch(provider, schema_filter, &namespace, cancel).await?;

        // Build
        let built = SchemaModelBuilder::new(&database, provider.source_name()).build(
            &raw_tables,
            &raw_columns,
            &raw_constraints,
        )?;
        let model = built.model;
        let mut warnings: Vec<IntrospectionWarning> =
            built.warnings.into_iter().map(Into::into).collect();

        // Infer
        let inference = &self.settings.inference;
        let outcome = self.engine.infer(
            &model,
            inference.fk_inference_similarity_threshold,
            inference.enable_fk_inference,
        );
        for ambiguity in &outcome.warnings {
            warn!(%namespace, "{ambiguity}");
        }
        warnings.extend(outcome.warnings.into_iter().map(Into::into));

        let explicit = model.relationships().len();
        let inferred = outcome.relationships.len();
        let mut relationships = model.relationships().to_vec();
        relationships.extend(outcome.relationships);

        // Validate
        let graph = SchemaGraph::from_model(&model, &relationships)?;
        let (nodes, edges) = graph.records()?;

        if cancel.is_cancelled() {
            info!(%run_id, %namespace, "introspection cancelled before commit");
            return Err(Error::Cancelled(namespace));
        }

        // Commit
        let previous = self.store.last_run(&namespace)?;
        let run = RunRecord {
            namespace: namespace.clone(),
            database: database.clone(),
            run_id: run_id.clone(),
            content_hash: model.content_hash().to_string(),
            completed_at: unix_now(),
        };
        let store = Arc::clone(&self.store);
        let summary = tokio::task::spawn_blocking(move || store.upsert(&run, &nodes, &edges))
            .await
            .map_err(StoreError::from)??;

        info!(
            %run_id,
            %namespace,
            tables = model.table_count(),
            explicit,
            inferred,
            warnings = warnings.len(),
            "introspection committed"
        );

        Ok(IntrospectionReport {
            run_id,
            database,
            namespace,
            source: provider.source_name().to_string(),
            tables: model.table_count(),
            columns: model.column_count(),
            explicit_relationships: explicit,
            inferred_relationships: inferred,
            content_hash: model.content_hash().to_string(),
            model_unchanged: previous.is_some_and(|p| p.content_hash == model.content_hash()),
            store: summary,
            warnings,
        })
    }

    /// Fetch tables, then columns and foreign keys of each table with bounded
    /// concurrency. Results keep catalog order.
    async fn fetch<P>(
        &self,
        provider: &P,
        schema_filter: Option<&str>,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<(Vec<RawTable>, Vec<RawColumn>, Vec<RawConstraint>)>
    where
        P: MetadataProvider + ?Sized,
    {
        let tables = provider.list_tables(schema_filter).await?;
        let concurrency = self.settings.introspection.max_concurrency.max(1);

        // Owned rows keep the stream's futures Send for spawned callers.
        let described: Vec<(Vec<RawColumn>, Vec<RawConstraint>)> =
            stream::iter(tables.iter().cloned())
                .map(|table| async move {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled(namespace.to_string()));
                    }
                    Ok(provider.describe_table(&table).await?)
                })
                .buffered(concurrency)
                .try_collect()
                .await?;

        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        for (table_columns, table_constraints) in described {
            columns.extend(table_columns);
            constraints.extend(table_constraints);
        }
        Ok((tables, columns, constraints))
    }

    // ===== Queries =====

    /// Fuzzy search over all stored tables and columns.
    ///
    /// `threshold` defaults to `search.similarity_threshold`.
    pub async fn search(&self, query: &str, threshold: Option<f64>) -> Result<Vec<SchemaMatch>> {
        let threshold = threshold.unwrap_or(self.settings.search.similarity_threshold);
        let limit = self.settings.search.max_results;
        let store = Arc::clone(&self.store);
        let index = Arc::clone(&self.index);
        let query = query.to_string();

        let matches = tokio::task::spawn_blocking(move || {
            store.query_fuzzy(&index, &query, threshold, limit, None)
        })
        .await
        .map_err(StoreError::from)??;
        Ok(matches)
    }

    /// Tables, their columns and every relationship touching them.
    pub async fn context(&self, table_names: &[String]) -> Result<SchemaContext> {
        let store = Arc::clone(&self.store);
        let names = table_names.to_vec();
        let context = tokio::task::spawn_blocking(move || store.query_context(&names, None))
            .await
            .map_err(StoreError::from)??;
        Ok(context)
    }

    /// Stored inferred relationships, highest confidence first.
    pub async fn inferred_relationships(&self) -> Result<Vec<StoredRelationship>> {
        let store = Arc::clone(&self.store);
        let relationships = tokio::task::spawn_blocking(move || store.query_inferred(None))
            .await
            .map_err(StoreError::from)??;
        Ok(relationships)
    }

    /// Confidence buckets and per-rule counts of stored inferred relationships.
    pub async fn inferred_statistics(&self) -> Result<InferenceStatistics> {
        let store = Arc::clone(&self.store);
        let stats = tokio::task::spawn_blocking(move || store.inferred_statistics(None))
            .await
            .map_err(StoreError::from)??;
        Ok(stats)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
