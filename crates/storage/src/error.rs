//! Errors returned by `FlowStore` implementations.

use wayfinder_core::FlowError;

/// All errors a storage backend can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No flow with this business identifier.
    #[error("flow not found: {flow_id}")]
    NotFound { flow_id: String },

    /// A flow with this business identifier already exists.
    #[error("flow already exists: {flow_id}")]
    AlreadyExists { flow_id: String },

    /// Optimistic concurrency conflict: the conditional
    /// `version = expected_version` write matched zero rows.
    #[error("version conflict on flow {flow_id}: expected version {expected_version}")]
    VersionConflict {
        flow_id: String,
        expected_version: i64,
    },

    /// Deletion blocked by dependent records (force = false).
    #[error("flow {flow_id} has {dependents} dependent record(s)")]
    HasDependents { flow_id: String, dependents: usize },

    /// Backend-specific failure (connection, serialization, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for FlowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { flow_id } => FlowError::NotFound { flow_id },
            StorageError::VersionConflict {
                flow_id,
                expected_version,
            } => FlowError::VersionConflict {
                flow_id,
                expected_version,
            },
            StorageError::HasDependents { flow_id, dependents } => {
                FlowError::HasDependents { flow_id, dependents }
            }
            StorageError::AlreadyExists { flow_id } => {
                FlowError::Storage(format!("flow already exists: {flow_id}"))
            }
            StorageError::Backend(message) => FlowError::Storage(message),
        }
    }
}
