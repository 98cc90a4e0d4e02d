//! Error taxonomy for the workflow memory core

use thiserror::Error;

/// Result alias used throughout this crate
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors surfaced by `WorkflowMemory` and `MemoryStore`
///
/// Every variant carries the identifying context (workflow id, component id,
/// data-type tag, path string) needed to log or report the failure without
/// re-deriving it from a generic string.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Workflow, pipeline data-type, or path target absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Batch index outside `0..batch_size`
    #[error("batch index {index} out of range (batch size {batch_size})")]
    BatchOutOfRange { index: usize, batch_size: usize },

    /// Path syntax valid but addressed the wrong `Value` variant
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Component was never initialised with `InitComponent`
    #[error("component not found: {component}")]
    ComponentNotFound { component: String },

    /// Malformed snapshot or event payload
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Durable KV or event bus failure
    #[error("io error: {0}")]
    IOError(String),

    /// Caller-supplied cancellation handle fired during I/O
    #[error("cancelled")]
    Cancelled,
}

impl MemoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn component_not_found(component: impl Into<String>) -> Self {
        Self::ComponentNotFound {
            component: component.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
