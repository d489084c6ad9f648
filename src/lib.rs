//! # Schemagraph
//!
//! A persistent knowledge graph of relational schemas, with foreign keys
//! inferred from naming conventions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          MetadataProvider (catalog or snapshot)          │
//! │        (raw tables, columns, declared constraints)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │           SchemaModel (validated, content hash)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [inference: naming rules + similarity]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Explicit + inferred relationships (confidence)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │   SchemaGraph (Database → Table → Column, FK edges)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [store: one transaction per namespace]
//! ┌─────────────────────────────────────────────────────────┐
//! │   SqliteGraphStore (search, context, inferred queries)   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod inference;
pub mod metadata;
pub mod naming;
pub mod schema;
pub mod service;
pub mod similarity;
pub mod store;

pub use error::{Error, IntrospectionWarning, Result};
pub use service::{IntrospectionReport, SchemaGraphService};
