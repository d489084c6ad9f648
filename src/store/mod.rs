//! Persistent property-graph store.
//!
//! Nodes and edges of every introspected database live in one SQLite file,
//! partitioned by namespace. A run replaces its namespace atomically:
//!
//! ```text
//! nodes  (namespace, id)                      -> kind, name, properties
//! edges  (namespace, source_id, target_id, kind) -> origin, confidence, rule, ...
//! runs   (namespace)                          -> database, run_id, content_hash, completed_at
//! meta   ('version')                          -> store format version
//! ```

mod sqlite;

pub use sqlite::SqliteGraphStore;

use serde::{Deserialize, Serialize};

use crate::graph::{ColumnNode, TableNode};
use crate::schema::Relationship;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store connection lock poisoned")]
    Poisoned,

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Corrupt store row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Bookkeeping for the last committed run of a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub namespace: String,
    pub database: String,
    pub run_id: String,
    pub content_hash: String,
    /// Unix seconds.
    pub completed_at: i64,
}

/// Row counts written by one upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    pub nodes_inserted: usize,
    pub nodes_updated: usize,
    pub nodes_unchanged: usize,
    pub nodes_removed: usize,
    pub edges_inserted: usize,
    pub edges_updated: usize,
    pub edges_unchanged: usize,
    pub edges_removed: usize,
}

impl UpsertSummary {
    /// True if the upsert left the namespace as it was.
    pub fn is_noop(&self) -> bool {
        self.nodes_inserted == 0
            && self.nodes_updated == 0
            && self.nodes_removed == 0
            && self.edges_inserted == 0
            && self.edges_updated == 0
            && self.edges_removed == 0
    }
}

/// A persisted relationship and the namespace it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRelationship {
    pub namespace: String,
    #[serde(flatten)]
    pub relationship: Relationship,
}

/// A table with its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableContext {
    pub namespace: String,
    pub table: TableNode,
    pub columns: Vec<ColumnNode>,
}

/// Subgraph around a set of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaContext {
    pub tables: Vec<TableContext>,
    /// Every relationship with at least one endpoint in `tables`.
    pub relationships: Vec<StoredRelationship>,
    /// Requested names that matched no table.
    pub missing: Vec<String>,
}
