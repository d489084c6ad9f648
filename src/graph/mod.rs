//! In-memory schema graph.
//!
//! Built from a [`SchemaModel`] plus the merged explicit and inferred
//! relationships of a run. Construction is the last validation step before
//! persistence: a relationship whose endpoints are not columns of the model
//! is rejected here.
//!
//! Nodes:
//! - Database
//! - Table
//! - Column
//!
//! Edges:
//! - HAS_TABLE: database → table
//! - HAS_COLUMN: table → column
//! - HAS_FOREIGN_KEY: column → column

pub mod types;

pub use types::*;

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::Value;

use crate::schema::{
    column_node_id, database_node_id, table_node_id, ColumnKey, Relationship, SchemaModel,
};

/// Errors that can occur during graph construction.
#[derive(Debug, thiserror::Error)]
pub enum GraphBuildError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Relationship {source_column} -> {target_column} references unknown column {missing}")]
    DanglingRelationship {
        source_column: String,
        target_column: String,
        missing: String,
    },

    #[error("Relationship {0} has confidence outside [0, 1]: {1}")]
    InvalidConfidence(String, f64),

    #[error("Failed to serialize graph record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type GraphBuildResult<T> = Result<T, GraphBuildError>;

/// Typed graph of one database.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    graph: DiGraph<GraphNode, GraphEdge>,

    /// Index: node id → NodeIndex
    node_index: HashMap<String, NodeIndex>,

    /// Index: column identity → NodeIndex
    column_index: HashMap<ColumnKey, NodeIndex>,

    database: String,
}

impl SchemaGraph {
    /// Construct the graph for `model` with its full relationship set.
    ///
    /// - Phase 1: database, table and column nodes with structural edges
    /// - Phase 2: HAS_FOREIGN_KEY edges, rejecting dangling endpoints
    pub fn from_model(model: &SchemaModel, relationships: &[Relationship]) -> GraphBuildResult<Self> {
        let database = model.database_name().to_string();
        let mut graph = Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            column_index: HashMap::new(),
            database: database.clone(),
        };

        let fk_sources: HashSet<ColumnKey> = relationships.iter().map(|r| r.source.key()).collect();

        // Phase 1: nodes
        let db_idx = graph.add_node(GraphNode::Database(DatabaseNode {
            id: database_node_id(&database),
            name: database.clone(),
            source: model.database.source.clone(),
        }))?;

        for table in model.tables() {
            let table_idx = graph.add_node(GraphNode::Table(TableNode {
                id: table_node_id(&database, &table.name),
                database: database.clone(),
                name: table.name.clone(),
                schema: table.schema.clone(),
                row_count: table.row_count,
                comment: table.comment.clone(),
                table_type: table.table_type.clone(),
            }))?;
            graph.graph.add_edge(db_idx, table_idx, GraphEdge::HasTable);

            for column in &table.columns {
                let key = ColumnKey::new(&table.name, &column.name);
                let column_idx = graph.add_node(GraphNode::Column(ColumnNode {
                    id: column_node_id(&database, &table.name, &column.name),
                    database: database.clone(),
                    table: table.name.clone(),
                    name: column.name.clone(),
                    data_type: column.data_type.clone(),
                    nullable: column.nullable,
                    is_primary_key: column.is_primary_key,
                    is_foreign_key: fk_sources.contains(&key),
                    ordinal: column.ordinal,
                    length: column.length,
                    precision: column.precision,
                    scale: column.scale,
                    default: column.default.clone(),
                    comment: column.comment.clone(),
                }))?;
                graph.column_index.insert(key, column_idx);
                graph.graph.add_edge(table_idx, column_idx, GraphEdge::HasColumn);
            }
        }

        // Phase 2: relationships
        for rel in relationships {
            if !(0.0..=1.0).contains(&rel.confidence) {
                return Err(GraphBuildError::InvalidConfidence(
                    format!("{} -> {}", rel.source, rel.target),
                    rel.confidence,
                ));
            }
            let dangling = |missing: String| GraphBuildError::DanglingRelationship {
                source_column: rel.source.to_string(),
                target_column: rel.target.to_string(),
                missing,
            };
            let from = *graph
                .column_index
                .get(&rel.source.key())
                .ok_or_else(|| dangling(rel.source.to_string()))?;
            let to = *graph
                .column_index
                .get(&rel.target.key())
                .ok_or_else(|| dangling(rel.target.to_string()))?;
            graph
                .graph
                .add_edge(from, to, GraphEdge::HasForeignKey(rel.clone()));
        }

        Ok(graph)
    }

    fn add_node(&mut self, node: GraphNode) -> GraphBuildResult<NodeIndex> {
        let id = node.id().to_string();
        if self.node_index.contains_key(&id) {
            return Err(GraphBuildError::DuplicateNode(id));
        }
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        Ok(idx)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|&idx| &self.graph[idx])
    }

    /// All HAS_FOREIGN_KEY relationships.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.graph.edge_weights().filter_map(|e| match e {
            GraphEdge::HasForeignKey(rel) => Some(rel),
            GraphEdge::HasTable | GraphEdge::HasColumn => None,
        })
    }

    /// Relationships leaving any column of `table`.
    pub fn foreign_keys_of(&self, table: &str) -> Vec<&Relationship> {
        let Some(&table_idx) = self.node_index.get(&table_node_id(&self.database, table)) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(table_idx, Direction::Outgoing)
            .flat_map(|col| self.graph.edges_directed(col.target(), Direction::Outgoing))
            .filter_map(|e| match e.weight() {
                GraphEdge::HasForeignKey(rel) => Some(rel),
                GraphEdge::HasTable | GraphEdge::HasColumn => None,
            })
            .collect()
    }

    /// Flatten into node and edge records, nodes before the edges that use them.
    pub fn records(&self) -> GraphBuildResult<(Vec<NodeRecord>, Vec<EdgeRecord>)> {
        let nodes = self
            .graph
            .node_weights()
            .map(NodeRecord::from_node)
            .collect::<Result<Vec<_>, _>>()?;

        let mut edges = Vec::with_capacity(self.graph.edge_count());
        for edge in self.graph.edge_references() {
            let source_id = self.graph[edge.source()].id().to_string();
            let target_id = self.graph[edge.target()].id().to_string();
            let weight = edge.weight();
            let record = match weight {
                GraphEdge::HasTable | GraphEdge::HasColumn => EdgeRecord {
                    source_id,
                    target_id,
                    kind: weight.edge_type().to_string(),
                    origin: None,
                    confidence: None,
                    rule: None,
                    matched_table: None,
                    matched_column: None,
                    properties: Value::Null,
                },
                GraphEdge::HasForeignKey(rel) => EdgeRecord {
                    source_id,
                    target_id,
                    kind: weight.edge_type().to_string(),
                    origin: Some(rel.origin),
                    confidence: Some(rel.confidence),
                    rule: rel.rule.clone(),
                    matched_table: rel.matched_table.clone(),
                    matched_column: rel.matched_column.clone(),
                    properties: serde_json::to_value(rel)?,
                },
            };
            edges.push(record);
        }

        Ok((nodes, edges))
    }
}
