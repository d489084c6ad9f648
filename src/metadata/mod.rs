//! Metadata providers.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │       MetadataProvider       │  list_tables(schema_filter)
//! │  (async, one database)       │  list_columns(table)
//! │                              │  list_foreign_keys(table)
//! └──────────────┬───────────────┘
//!                │ RawTable / RawColumn / RawConstraint
//!                ▼
//!        SchemaModelBuilder
//! ```
//!
//! [`SnapshotProvider`] serves rows from a JSON dump; live catalog readers
//! implement the same trait.

mod provider;
mod snapshot;
mod types;

pub use provider::{MetadataError, MetadataProvider, MetadataResult};
pub use snapshot::SnapshotProvider;
pub use types::*;
