//! The flow error taxonomy.
//!
//! Gate-pending is deliberately absent: a failed gate is an expected outcome
//! returned as structured data (`AdvanceOutcome::Paused` in the engine),
//! never an error. Everything here is a genuine failure with a distinct,
//! machine-readable kind so callers can react specifically.

use crate::flow::{FlowStatus, Phase};

/// Errors surfaced by the lifecycle controller and storage boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// Missing or mismatched tenant identifiers; rejected before any
    /// state mutation.
    #[error("invalid tenant context: {reason}")]
    InvalidTenantContext { reason: String },

    /// No flow with this business identifier.
    #[error("flow not found: {flow_id}")]
    NotFound { flow_id: String },

    /// Concurrent-write race detected at commit; re-fetch and retry.
    #[error("version conflict on flow {flow_id}: expected version {expected_version}")]
    VersionConflict {
        flow_id: String,
        expected_version: i64,
    },

    /// Operation not valid for the flow's lifecycle status
    /// (e.g. advancing a completed flow).
    #[error("flow {flow_id} is {status}, operation not permitted")]
    InvalidState { flow_id: String, status: FlowStatus },

    /// Deletion blocked by existing dependent records.
    #[error("flow {flow_id} has {dependents} dependent record(s); pass force=true to cascade")]
    HasDependents { flow_id: String, dependents: usize },

    /// A phase executor failed fatally (or exhausted its retries).
    #[error("executor for phase {phase} failed: {message}")]
    ExecutorFailed { phase: Phase, message: String },

    /// Input supplied for a phase that does not accept it.
    #[error("phase {phase} does not accept input of kind {kind}")]
    InputNotAccepted { phase: Phase, kind: String },

    /// Backend storage failure outside the modeled taxonomy.
    #[error("storage backend error: {0}")]
    Storage(String),
}

impl FlowError {
    /// Stable machine-readable kind for wire error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::InvalidTenantContext { .. } => "invalid_tenant_context",
            FlowError::NotFound { .. } => "not_found",
            FlowError::VersionConflict { .. } => "version_conflict",
            FlowError::InvalidState { .. } => "invalid_state",
            FlowError::HasDependents { .. } => "has_dependents",
            FlowError::ExecutorFailed { .. } => "executor_failed",
            FlowError::InputNotAccepted { .. } => "input_not_accepted",
            FlowError::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_snake_case() {
        let err = FlowError::HasDependents {
            flow_id: "flow-1".into(),
            dependents: 2,
        };
        assert_eq!(err.kind(), "has_dependents");
        assert!(err.to_string().contains("force=true"));
    }

    #[test]
    fn display_names_the_flow() {
        let err = FlowError::InvalidState {
            flow_id: "flow-9".into(),
            status: FlowStatus::Completed,
        };
        assert!(err.to_string().contains("flow-9"));
        assert!(err.to_string().contains("completed"));
    }
}
