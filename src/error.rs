//! Crate-level error and warning types.

use serde::Serialize;

use crate::config::SettingsError;
use crate::graph::GraphBuildError;
use crate::inference::InferenceAmbiguityWarning;
use crate::metadata::MetadataError;
use crate::schema::MalformedMetadataError;
use crate::store::StoreError;

/// Errors surfaced by service operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Metadata unusable as a whole (no table survived validation).
    #[error(transparent)]
    Malformed(#[from] MalformedMetadataError),

    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Namespace '{0}' is being written by another introspection")]
    NamespaceLocked(String),

    #[error("Introspection of namespace '{0}' was cancelled")]
    Cancelled(String),

    #[error("Metadata provider failed: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Graph rejected: {0}")]
    Graph(#[from] GraphBuildError),

    #[error("Invalid configuration: {0}")]
    Settings(#[from] SettingsError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal findings of an introspection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum IntrospectionWarning {
    MalformedMetadata(MalformedMetadataError),
    InferenceAmbiguity(InferenceAmbiguityWarning),
}

impl std::fmt::Display for IntrospectionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntrospectionWarning::MalformedMetadata(w) => write!(f, "{w}"),
            IntrospectionWarning::InferenceAmbiguity(w) => write!(f, "{w}"),
        }
    }
}

impl From<MalformedMetadataError> for IntrospectionWarning {
    fn from(w: MalformedMetadataError) -> Self {
        IntrospectionWarning::MalformedMetadata(w)
    }
}

impl From<InferenceAmbiguityWarning> for IntrospectionWarning {
    fn from(w: InferenceAmbiguityWarning) -> Self {
        IntrospectionWarning::InferenceAmbiguity(w)
    }
}
