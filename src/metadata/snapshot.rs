//! Metadata provider backed by a JSON snapshot.

use std::path::Path;

use async_trait::async_trait;

use super::provider::{MetadataProvider, MetadataResult};
use super::types::{MetadataSnapshot, RawColumn, RawConstraint, RawTable};
use crate::schema::TableKey;

/// Serves catalog rows from an in-memory [`MetadataSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    source: String,
    snapshot: MetadataSnapshot,
}

impl SnapshotProvider {
    pub fn new(source: impl Into<String>, snapshot: MetadataSnapshot) -> Self {
        Self {
            source: source.into(),
            snapshot,
        }
    }

    /// Load a snapshot file (`{"tables": [...], "columns": [...], "constraints": [...]}`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> MetadataResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let snapshot: MetadataSnapshot = serde_json::from_str(&content)?;
        Ok(Self::new(path.display().to_string(), snapshot))
    }

    pub fn snapshot(&self) -> &MetadataSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl MetadataProvider for SnapshotProvider {
    fn source_name(&self) -> &str {
        &self.source
    }

    async fn list_tables(&self, schema_filter: Option<&str>) -> MetadataResult<Vec<RawTable>> {
        let tables = self
            .snapshot
            .tables
            .iter()
            .filter(|t| match (schema_filter, t.schema.as_deref()) {
                (None, _) => true,
                (Some(wanted), Some(schema)) => schema.eq_ignore_ascii_case(wanted),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();
        Ok(tables)
    }

    async fn list_columns(&self, table: &RawTable) -> MetadataResult<Vec<RawColumn>> {
        let key = TableKey::new(&table.name);
        Ok(self
            .snapshot
            .columns
            .iter()
            .filter(|c| TableKey::new(&c.table) == key)
            .cloned()
            .collect())
    }

    async fn list_foreign_keys(&self, table: &RawTable) -> MetadataResult<Vec<RawConstraint>> {
        let key = TableKey::new(&table.name);
        Ok(self
            .snapshot
            .constraints
            .iter()
            .filter(|c| TableKey::new(&c.source_table) == key)
            .cloned()
            .collect())
    }
}
