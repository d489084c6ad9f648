//! MetadataProvider trait definition.
//!
//! The provider abstracts over where catalog rows come from: a live
//! database connection, a worker process, or a JSON snapshot on disk. The
//! introspection pipeline only ever talks to this trait.

use async_trait::async_trait;

use super::types::{RawColumn, RawConstraint, RawTable};

/// Errors raised by a metadata provider.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to read metadata source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse metadata snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Metadata source error: {0}")]
    Source(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Trait for fetching raw catalog rows for one database.
///
/// Implementations return rows in catalog order; the pipeline keeps that
/// order when it fans out per-table requests.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Identifier of the metadata source (connection name, file path).
    fn source_name(&self) -> &str;

    /// List tables, optionally restricted to one schema (case-insensitive).
    async fn list_tables(&self, schema_filter: Option<&str>) -> MetadataResult<Vec<RawTable>>;

    /// List the columns of a table.
    async fn list_columns(&self, table: &RawTable) -> MetadataResult<Vec<RawColumn>>;

    /// List the foreign keys whose source is a column of `table`.
    async fn list_foreign_keys(&self, table: &RawTable) -> MetadataResult<Vec<RawConstraint>>;

    /// Fetch columns and foreign keys of one table.
    ///
    /// Default implementation issues both requests concurrently.
    async fn describe_table(
        &self,
        table: &RawTable,
    ) -> MetadataResult<(Vec<RawColumn>, Vec<RawConstraint>)> {
        let (columns, constraints) =
            futures::future::join(self.list_columns(table), self.list_foreign_keys(table)).await;
        Ok((columns?, constraints?))
    }
}
