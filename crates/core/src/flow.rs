//! Flow records: the persisted state of one migration flow.
//!
//! `status` and `current_phase` are deliberately orthogonal: `status` is the
//! coarse lifecycle (a small fixed enum) and never encodes *why* a flow is
//! paused. Pause reasons and recorded failures live in the structured
//! [`PhaseState`] attached to the record. Only the lifecycle controller in
//! `wayfinder-engine` writes `status` and `current_phase`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gate::{GateKind, MissingItem};
use crate::phase_data::PhaseOutput;
use crate::tenant::TenantContext;

// ──────────────────────────────────────────────
// Flow types and phase sequences
// ──────────────────────────────────────────────

/// The three flow types, each with a fixed linear phase sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Discovery,
    Collection,
    Assessment,
}

impl FlowType {
    /// The ordered phase sequence for this flow type.
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            FlowType::Discovery => &[
                Phase::DataImport,
                Phase::FieldMapping,
                Phase::Enrichment,
            ],
            FlowType::Collection => &[
                Phase::QuestionnaireGeneration,
                Phase::ResponseCollection,
                Phase::GapAnalysis,
            ],
            FlowType::Assessment => &[
                Phase::ReadinessScoring,
                Phase::StrategyRecommendation,
                Phase::Review,
            ],
        }
    }

    /// First phase of the sequence.
    pub fn first_phase(&self) -> Phase {
        self.phases()[0]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Discovery => "discovery",
            FlowType::Collection => "collection",
            FlowType::Assessment => "assessment",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named step in a flow's phase sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    DataImport,
    FieldMapping,
    Enrichment,
    QuestionnaireGeneration,
    ResponseCollection,
    GapAnalysis,
    ReadinessScoring,
    StrategyRecommendation,
    Review,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::DataImport => "data_import",
            Phase::FieldMapping => "field_mapping",
            Phase::Enrichment => "enrichment",
            Phase::QuestionnaireGeneration => "questionnaire_generation",
            Phase::ResponseCollection => "response_collection",
            Phase::GapAnalysis => "gap_analysis",
            Phase::ReadinessScoring => "readiness_scoring",
            Phase::StrategyRecommendation => "strategy_recommendation",
            Phase::Review => "review",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Lifecycle status
// ──────────────────────────────────────────────

/// Coarse flow lifecycle. Small and fixed; pause reasons never leak in here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Initialized,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl FlowStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FlowStatus::Completed | FlowStatus::Failed | FlowStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Initialized => "initialized",
            FlowStatus::Running => "running",
            FlowStatus::Paused => "paused",
            FlowStatus::Completed => "completed",
            FlowStatus::Failed => "failed",
            FlowStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Structured phase state (pause reasons, recorded failures)
// ──────────────────────────────────────────────

/// Machine-readable operational flags for the current phase.
///
/// Attached when a gate pauses the flow (listing exactly which items are
/// missing) or when an executor fails fatally (preserving the original
/// error). Cleared on every successful transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    /// The gate that paused the flow, if any.
    pub gate: Option<GateKind>,
    /// Concrete missing items; each one is an actionable next step.
    #[serde(default)]
    pub missing: Vec<MissingItem>,
    /// Score the gate computed, when the gate is score-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// True when resumption needs a human-supplied artifact
    /// (import batch, questionnaire responses, review decision).
    #[serde(default)]
    pub awaiting_input: bool,
    /// Last executor error, recorded when the flow moved to `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseState {
    /// Pause state for a failed gate evaluation.
    pub fn gate_pending(
        gate: GateKind,
        missing: Vec<MissingItem>,
        score: Option<f64>,
    ) -> Self {
        PhaseState {
            awaiting_input: gate.awaits_input(),
            gate: Some(gate),
            missing,
            score,
            error: None,
        }
    }

    /// State recording a fatal executor error.
    pub fn executor_failed(error: String) -> Self {
        PhaseState {
            gate: None,
            missing: Vec::new(),
            score: None,
            awaiting_input: false,
            error: Some(error),
        }
    }
}

// ──────────────────────────────────────────────
// Flow record
// ──────────────────────────────────────────────

/// The persisted record of one in-progress migration flow.
///
/// `flow_id` is the durable business identifier: the only value used in API
/// paths, external queries, and dependent-record foreign keys. Storage
/// backends may keep an internal row key, but it must never leave the
/// storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub flow_id: String,
    pub tenant: TenantContext,
    pub flow_type: FlowType,
    pub status: FlowStatus,
    pub current_phase: Phase,
    /// One completion flag per phase of the sequence.
    pub phase_completion: BTreeMap<Phase, bool>,
    /// Accumulated outputs, one typed slot per phase.
    pub phase_data: BTreeMap<Phase, PhaseOutput>,
    /// Structured pause/failure flags; `None` while cleanly running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_state: Option<PhaseState>,
    /// OCC version, owned by the storage layer. 0 on insert.
    pub version: i64,
    /// RFC 3339 timestamp strings.
    pub created_at: String,
    pub updated_at: String,
}

impl FlowRecord {
    /// Create a fresh record at the first phase of the sequence.
    pub fn new(flow_id: String, flow_type: FlowType, tenant: TenantContext) -> Self {
        let now = crate::rfc3339_now();
        let phase_completion = flow_type
            .phases()
            .iter()
            .map(|p| (*p, false))
            .collect();
        FlowRecord {
            flow_id,
            tenant,
            flow_type,
            status: FlowStatus::Initialized,
            current_phase: flow_type.first_phase(),
            phase_completion,
            phase_data: BTreeMap::new(),
            phase_state: None,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The phase after `current_phase`, or `None` at the end of the sequence.
    pub fn next_phase(&self) -> Option<Phase> {
        let phases = self.flow_type.phases();
        phases
            .iter()
            .position(|p| *p == self.current_phase)
            .and_then(|i| phases.get(i + 1))
            .copied()
    }

    /// Whether `current_phase` is the final phase of the sequence.
    pub fn at_last_phase(&self) -> bool {
        self.next_phase().is_none()
    }

    /// Committed output for a phase, if present.
    pub fn output(&self, phase: Phase) -> Option<&PhaseOutput> {
        self.phase_data.get(&phase)
    }
}
