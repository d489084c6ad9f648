//! Schema model: the validated Database/Table/Column entities of one
//! introspection run, plus the explicit relationships declared by the
//! catalog.
//!
//! ```text
//! Database ──HAS_TABLE──> Table ──HAS_COLUMN──> Column
//!                                                 │
//!                                      HAS_FOREIGN_KEY (explicit | inferred)
//!                                                 ▼
//!                                               Column
//! ```
//!
//! Table identity is the case-insensitive table name within the database;
//! every entity keeps its introspected spelling for display and storage.

mod builder;
mod hash;

pub use builder::{BuildOutput, SchemaModelBuilder};
pub use hash::compute_hash;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identity
// ============================================================================

/// Case-insensitive table identity within a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey(String);

impl TableKey {
    pub fn new(table: &str) -> Self {
        Self(table.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive column identity: `(table, column)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub table: TableKey,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: TableKey::new(table),
            column: column.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Node id of a database: `database_<db>`.
pub fn database_node_id(database: &str) -> String {
    format!("database_{database}")
}

/// Node id of a table: `<db>_table_<TABLE>`.
pub fn table_node_id(database: &str, table: &str) -> String {
    format!("{database}_table_{table}")
}

/// Node id of a column: `<db>_column_<TABLE>_<COLUMN>`.
pub fn column_node_id(database: &str, table: &str, column: &str) -> String {
    format!("{database}_column_{table}_{column}")
}

// ============================================================================
// Entities
// ============================================================================

/// Root entity of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    /// Where the metadata came from (connection name, snapshot path).
    pub source: String,
}

/// A table and its columns in ordinal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: Option<String>,
    pub row_count: Option<i64>,
    pub comment: Option<String>,
    pub table_type: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn key(&self) -> TableKey {
        TableKey::new(&self.name)
    }

    /// Look up a column case-insensitively, folding the same way as [`ColumnKey`].
    pub fn column(&self, name: &str) -> Option<&Column> {
        let wanted = name.trim().to_uppercase();
        self.columns
            .iter()
            .find(|c| c.name.trim().to_uppercase() == wanted)
    }

    /// Declared primary-key columns, lowest ordinal first.
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// 1-based position within the table.
    pub ordinal: u32,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    pub default: Option<String>,
    pub comment: Option<String>,
}

// ============================================================================
// Relationships
// ============================================================================

/// Endpoint of a relationship, in introspected spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn key(&self) -> ColumnKey {
        ColumnKey::new(&self.table, &self.column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Where a relationship came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipOrigin {
    /// Declared by a catalog constraint.
    Explicit,
    /// Derived from column naming.
    Inferred,
}

impl RelationshipOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipOrigin::Explicit => "explicit",
            RelationshipOrigin::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "explicit" => Some(RelationshipOrigin::Explicit),
            "inferred" => Some(RelationshipOrigin::Inferred),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A HAS_FOREIGN_KEY edge between two columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: ColumnRef,
    pub target: ColumnRef,
    pub origin: RelationshipOrigin,
    /// 1.0 for explicit relationships.
    pub confidence: f64,
    /// Naming rule that produced an inferred relationship.
    pub rule: Option<String>,
    /// Normalized target table name as matched.
    pub matched_table: Option<String>,
    /// Normalized target column name as matched.
    pub matched_column: Option<String>,
    pub constraint_name: Option<String>,
}

impl Relationship {
    /// An explicit relationship with confidence 1.0.
    pub fn explicit(source: ColumnRef, target: ColumnRef, constraint_name: Option<String>) -> Self {
        Self {
            source,
            target,
            origin: RelationshipOrigin::Explicit,
            confidence: 1.0,
            rule: None,
            matched_table: None,
            matched_column: None,
            constraint_name,
        }
    }

    pub fn is_inferred(&self) -> bool {
        self.origin == RelationshipOrigin::Inferred
    }

    /// Unordered endpoint identity.
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey::new(self.source.key(), self.target.key())
    }
}

/// Unordered pair of column identities.
///
/// `A -> B` and `B -> A` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    low: ColumnKey,
    high: ColumnKey,
}

impl RelationshipKey {
    pub fn new(a: ColumnKey, b: ColumnKey) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Validated entities of one database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub database: Database,
    /// Tables by identity, iterated in key order.
    tables: BTreeMap<TableKey, Table>,
    /// Explicit relationships in constraint order.
    relationships: Vec<Relationship>,
    content_hash: String,
}

impl SchemaModel {
    pub fn database_name(&self) -> &str {
        &self.database.name
    }

    /// Tables in identity order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&TableKey::new(name))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }

    /// Resolve a column reference case-insensitively.
    pub fn column(&self, reference: &ColumnRef) -> Option<(&Table, &Column)> {
        let table = self.table(&reference.table)?;
        let column = table.column(&reference.column)?;
        Some((table, column))
    }

    /// Explicit relationships.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// SHA-256 of the model content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

// ============================================================================
// Malformed metadata
// ============================================================================

/// A raw metadata row that could not be placed in the model.
///
/// Every variant except [`MalformedMetadataError::NoTables`] drops only the
/// offending row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MalformedMetadataError {
    #[error("Table with empty name dropped")]
    EmptyTableName,

    #[error("Duplicate table '{table}' dropped")]
    DuplicateTable { table: String },

    #[error("Column '{table}.{column}' references unknown table '{table}'")]
    UnknownTable { table: String, column: String },

    #[error("Column with empty name in table '{table}' dropped")]
    EmptyColumnName { table: String },

    #[error("Duplicate column '{table}.{column}' dropped")]
    DuplicateColumn { table: String, column: String },

    #[error("Column '{table}.{column}' dropped: its node id collides with '{existing}'")]
    ColumnIdCollision {
        table: String,
        column: String,
        existing: String,
    },

    #[error("Constraint {source_column_ref} -> {target_column_ref} references unknown column '{missing}'")]
    DanglingConstraint {
        source_column_ref: String,
        target_column_ref: String,
        missing: String,
    },

    #[error("No introspectable tables in database '{database}'")]
    NoTables { database: String },
}
