//! Dependent and audit record types.
//!
//! Both are keyed by the business `flow_id`. An internal storage row key,
//! if a backend keeps one, never appears in these foreign keys.

use serde::{Deserialize, Serialize};
use wayfinder_core::{FlowStatus, Phase};

/// A dependent record hanging off a flow: one recorded questionnaire
/// response. Blocks non-forced deletion of its parent flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentRecord {
    pub id: String,
    /// Business identifier of the parent flow.
    pub flow_id: String,
    pub questionnaire_id: String,
    pub respondent: String,
    /// RFC 3339 timestamp string.
    pub recorded_at: String,
}

/// Append-only audit row for one committed status/phase change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: String,
    pub flow_id: String,
    pub from_status: FlowStatus,
    pub to_status: FlowStatus,
    pub from_phase: Phase,
    pub to_phase: Phase,
    pub from_version: i64,
    pub to_version: i64,
    /// RFC 3339 timestamp string.
    pub at: String,
}
