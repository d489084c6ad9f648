//! Construction of a [`SchemaModel`] from raw catalog rows.
//!
//! Construction happens in three phases:
//! - Phase 1: tables (duplicates dropped)
//! - Phase 2: columns attached to their tables (orphans and duplicates dropped)
//! - Phase 3: explicit relationships from constraints (dangling ones dropped)
//!
//! Every dropped row is reported as a [`MalformedMetadataError`] warning.
//! The build fails only when no table survives phase 1.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use super::{
    column_node_id, compute_hash, Column, ColumnRef, Database, MalformedMetadataError, Relationship, SchemaModel,
    Table, TableKey,
};
use crate::metadata::{RawColumn, RawConstraint, RawTable};

/// Table type recorded when the catalog does not supply one.
const DEFAULT_TABLE_TYPE: &str = "TABLE";

/// A built model plus the rows that were dropped on the way.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub model: SchemaModel,
    pub warnings: Vec<MalformedMetadataError>,
}

/// Builds a [`SchemaModel`] for one database.
#[derive(Debug, Clone)]
pub struct SchemaModelBuilder {
    database: Database,
}

impl SchemaModelBuilder {
    pub fn new(database_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            database: Database {
                name: database_name.into(),
                source: source.into(),
            },
        }
    }

    /// Build the model. Input order is preserved wherever it is observable.
    pub fn build(
        &self,
        raw_tables: &[RawTable],
        raw_columns: &[RawColumn],
        raw_constraints: &[RawConstraint],
    ) -> Result<BuildOutput, MalformedMetadataError> {
        let mut warnings = Vec::new();

        let mut tables = collect_tables(raw_tables, &mut warnings);
        if tables.is_empty() {
            return Err(MalformedMetadataError::NoTables {
                database: self.database.name.clone(),
            });
        }
        attach_columns(&self.database.name, &mut tables, raw_columns, &mut warnings);
        let relationships = collect_relationships(&tables, raw_constraints, &mut warnings);

        let content_hash = hash_content(&self.database, &tables, &relationships);

        for warning in &warnings {
            warn!(database = %self.database.name, "{warning}");
        }

        Ok(BuildOutput {
            model: SchemaModel {
                database: self.database.clone(),
                tables,
                relationships,
                content_hash,
            },
            warnings,
        })
    }
}

// ============================================================================
// Phase 1: Tables
// ============================================================================

fn collect_tables(
    raw_tables: &[RawTable],
    warnings: &mut Vec<MalformedMetadataError>,
) -> BTreeMap<TableKey, Table> {
    let mut tables = BTreeMap::new();

    for raw in raw_tables {
        let name = raw.name.trim();
        if name.is_empty() {
            warnings.push(MalformedMetadataError::EmptyTableName);
            continue;
        }

        let key = TableKey::new(name);
        if tables.contains_key(&key) {
            warnings.push(MalformedMetadataError::DuplicateTable {
                table: name.to_string(),
            });
            continue;
        }

        tables.insert(
            key,
            Table {
                name: name.to_string(),
                schema: raw.schema.clone(),
                row_count: raw.row_count,
                comment: raw.comment.clone(),
                table_type: raw
                    .table_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TABLE_TYPE.to_string()),
                columns: Vec::new(),
            },
        );
    }

    tables
}

// ============================================================================
// Phase 2: Columns
// ============================================================================

fn attach_columns(
    database: &str,
    tables: &mut BTreeMap<TableKey, Table>,
    raw_columns: &[RawColumn],
    warnings: &mut Vec<MalformedMetadataError>,
) {
    // Node id -> "TABLE.COLUMN" of the column that claimed it first.
    let mut node_ids: HashMap<String, String> = HashMap::new();

    for raw in raw_columns {
        let column_name = raw.name.trim();
        let Some(table) = tables.get_mut(&TableKey::new(&raw.table)) else {
            warnings.push(MalformedMetadataError::UnknownTable {
                table: raw.table.clone(),
                column: raw.name.clone(),
            });
            continue;
        };

        if column_name.is_empty() {
            warnings.push(MalformedMetadataError::EmptyColumnName {
                table: table.name.clone(),
            });
            continue;
        }
        if table.column(column_name).is_some() {
            warnings.push(MalformedMetadataError::DuplicateColumn {
                table: table.name.clone(),
                column: column_name.to_string(),
            });
            continue;
        }
        let node_id = column_node_id(database, &table.name, column_name);
        if let Some(existing) = node_ids.get(&node_id) {
            warnings.push(MalformedMetadataError::ColumnIdCollision {
                table: table.name.clone(),
                column: column_name.to_string(),
                existing: existing.clone(),
            });
            continue;
        }
        node_ids.insert(node_id, format!("{}.{}", table.name, column_name));

        let ordinal = raw
            .ordinal
            .unwrap_or_else(|| u32::try_from(table.columns.len() + 1).unwrap_or(u32::MAX));

        table.columns.push(Column {
            name: column_name.to_string(),
            data_type: raw.data_type.clone(),
            nullable: raw.nullable,
            is_primary_key: raw.is_primary_key,
            ordinal,
            length: raw.length,
            precision: raw.precision,
            scale: raw.scale,
            default: raw.default.clone(),
            comment: raw.comment.clone(),
        });
    }

    for table in tables.values_mut() {
        // Stable: equal ordinals keep catalog order.
        table.columns.sort_by_key(|c| c.ordinal);
    }
}

// ============================================================================
// Phase 3: Explicit relationships
// ============================================================================

fn collect_relationships(
    tables: &BTreeMap<TableKey, Table>,
    raw_constraints: &[RawConstraint],
    warnings: &mut Vec<MalformedMetadataError>,
) -> Vec<Relationship> {
    let resolve = |table: &str, column: &str| -> Option<ColumnRef> {
        let table = tables.get(&TableKey::new(table))?;
        let column = table.column(column)?;
        Some(ColumnRef::new(table.name.clone(), column.name.clone()))
    };

    let mut seen = HashSet::new();
    let mut relationships = Vec::new();

    for raw in raw_constraints {
        let source = resolve(&raw.source_table, &raw.source_column);
        let target = resolve(&raw.target_table, &raw.target_column);

        let (source, target) = match (source, target) {
            (Some(source), Some(target)) => (source, target),
            (source, _) => {
                let missing = if source.is_none() {
                    format!("{}.{}", raw.source_table, raw.source_column)
                } else {
                    format!("{}.{}", raw.target_table, raw.target_column)
                };
                warnings.push(MalformedMetadataError::DanglingConstraint {
                    source_column_ref: format!("{}.{}", raw.source_table, raw.source_column),
                    target_column_ref: format!("{}.{}", raw.target_table, raw.target_column),
                    missing,
                });
                continue;
            }
        };

        if !seen.insert((source.key(), target.key())) {
            continue;
        }
        relationships.push(Relationship::explicit(source, target, raw.name.clone()));
    }

    relationships
}

// ============================================================================
// Content hash
// ============================================================================

#[derive(Serialize)]
struct HashedContent<'a> {
    database: &'a Database,
    tables: Vec<&'a Table>,
    relationships: &'a [Relationship],
}

fn hash_content(
    database: &Database,
    tables: &BTreeMap<TableKey, Table>,
    relationships: &[Relationship],
) -> String {
    let content = HashedContent {
        database,
        tables: tables.values().collect(),
        relationships,
    };
    match compute_hash(&content) {
        Ok(hash) => hash,
        Err(err) => {
            warn!(error = %err, "failed to hash schema model");
            String::new()
        }
    }
}
