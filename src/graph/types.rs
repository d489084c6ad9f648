//! Node and edge types of the schema graph, and their flat store records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{Relationship, RelationshipOrigin};

// ============================================================================
// Node Types
// ============================================================================

/// Database node (namespace root).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseNode {
    pub id: String,
    pub name: String,
    pub source: String,
}

/// Table node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    pub id: String,
    pub database: String,
    pub name: String,
    pub schema: Option<String>,
    pub row_count: Option<i64>,
    pub comment: Option<String>,
    pub table_type: String,
}

/// Column node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNode {
    pub id: String,
    pub database: String,
    pub table: String,
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// Source of at least one HAS_FOREIGN_KEY edge.
    pub is_foreign_key: bool,
    pub ordinal: u32,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    pub default: Option<String>,
    pub comment: Option<String>,
}

impl ColumnNode {
    /// Qualified name (table.column).
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// Node kinds. Closed set, matched exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    Database(DatabaseNode),
    Table(TableNode),
    Column(ColumnNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Database(n) => &n.id,
            GraphNode::Table(n) => &n.id,
            GraphNode::Column(n) => &n.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GraphNode::Database(n) => &n.name,
            GraphNode::Table(n) => &n.name,
            GraphNode::Column(n) => &n.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Database(_) => NodeKind::Database,
            GraphNode::Table(_) => NodeKind::Table,
            GraphNode::Column(_) => NodeKind::Column,
        }
    }

    fn properties(&self) -> Result<Value, serde_json::Error> {
        match self {
            GraphNode::Database(n) => serde_json::to_value(n),
            GraphNode::Table(n) => serde_json::to_value(n),
            GraphNode::Column(n) => serde_json::to_value(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Database,
    Table,
    Column,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Database => "Database",
            NodeKind::Table => "Table",
            NodeKind::Column => "Column",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Database" => Some(NodeKind::Database),
            "Table" => Some(NodeKind::Table),
            "Column" => Some(NodeKind::Column),
            _ => None,
        }
    }
}

// ============================================================================
// Edge Types
// ============================================================================

/// Edge kinds. HAS_TABLE and HAS_COLUMN are structural; HAS_FOREIGN_KEY
/// carries a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEdge {
    HasTable,
    HasColumn,
    HasForeignKey(Relationship),
}

impl GraphEdge {
    pub fn edge_type(&self) -> &'static str {
        match self {
            GraphEdge::HasTable => "HAS_TABLE",
            GraphEdge::HasColumn => "HAS_COLUMN",
            GraphEdge::HasForeignKey(_) => "HAS_FOREIGN_KEY",
        }
    }
}

// ============================================================================
// Store records
// ============================================================================

/// Flat node row as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub properties: Value,
}

impl NodeRecord {
    pub(crate) fn from_node(node: &GraphNode) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: node.id().to_string(),
            kind: node.kind(),
            name: node.name().to_string(),
            properties: node.properties()?,
        })
    }
}

/// Flat edge row as persisted. `origin` and `confidence` are set on
/// HAS_FOREIGN_KEY edges only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source_id: String,
    pub target_id: String,
    pub kind: String,
    pub origin: Option<RelationshipOrigin>,
    pub confidence: Option<f64>,
    pub rule: Option<String>,
    pub matched_table: Option<String>,
    pub matched_column: Option<String>,
    pub properties: Value,
}
