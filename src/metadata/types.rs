//! Raw introspected metadata rows.
//!
//! These mirror what a database catalog query returns, before any
//! validation. Names are kept exactly as introspected.

use serde::{Deserialize, Serialize};

/// One row of the table listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub row_count: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    /// `TABLE` when absent.
    #[serde(default)]
    pub table_type: Option<String>,
}

impl RawTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            row_count: None,
            comment: None,
            table_type: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_row_count(mut self, rows: i64) -> Self {
        self.row_count = Some(rows);
        self
    }
}

/// One row of the column listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub table: String,
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<i32>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl RawColumn {
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            ordinal: None,
            length: None,
            precision: None,
            scale: None,
            default: None,
            comment: None,
        }
    }

    /// Mark as a non-null primary key column.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A declared foreign-key constraint `source_table.source_column ->
/// target_table.target_column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConstraint {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl RawConstraint {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            source_column: source_column.into(),
            target_table: target_table.into(),
            target_column: target_column.into(),
            name: None,
        }
    }
}

/// A complete metadata dump for one database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub columns: Vec<RawColumn>,
    #[serde(default)]
    pub constraints: Vec<RawConstraint>,
}
