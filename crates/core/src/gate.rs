//! Gate results: the structured outcome of a phase-completion predicate.
//!
//! A failed gate is an expected, user-resolvable outcome. It never surfaces
//! as an error; it pauses the flow with the concrete missing items so the
//! caller always has a next action. The predicates themselves live in
//! `wayfinder-engine::gates` and are pure functions of `phase_data`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flow::Phase;

/// The named gate bound to completing each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    RecordsImported,
    MappingsResolved,
    QualityThreshold,
    QuestionnairesGenerated,
    ResponsesReceived,
    GapClosure,
    ReadinessThreshold,
    StrategiesAssigned,
    ReviewApproved,
}

impl GateKind {
    /// The gate guarding completion of the given phase.
    pub fn for_phase(phase: Phase) -> GateKind {
        match phase {
            Phase::DataImport => GateKind::RecordsImported,
            Phase::FieldMapping => GateKind::MappingsResolved,
            Phase::Enrichment => GateKind::QualityThreshold,
            Phase::QuestionnaireGeneration => GateKind::QuestionnairesGenerated,
            Phase::ResponseCollection => GateKind::ResponsesReceived,
            Phase::GapAnalysis => GateKind::GapClosure,
            Phase::ReadinessScoring => GateKind::ReadinessThreshold,
            Phase::StrategyRecommendation => GateKind::StrategiesAssigned,
            Phase::Review => GateKind::ReviewApproved,
        }
    }

    /// Whether an unmet gate waits on a human-supplied artifact
    /// (as opposed to more computation or upstream data).
    pub fn awaits_input(&self) -> bool {
        matches!(
            self,
            GateKind::RecordsImported
                | GateKind::ResponsesReceived
                | GateKind::ReadinessThreshold
                | GateKind::ReviewApproved
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::RecordsImported => "records_imported",
            GateKind::MappingsResolved => "mappings_resolved",
            GateKind::QualityThreshold => "quality_threshold",
            GateKind::QuestionnairesGenerated => "questionnaires_generated",
            GateKind::ResponsesReceived => "responses_received",
            GateKind::GapClosure => "gap_closure",
            GateKind::ReadinessThreshold => "readiness_threshold",
            GateKind::StrategiesAssigned => "strategies_assigned",
            GateKind::ReviewApproved => "review_approved",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete blocker enumerated by a failed gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingItem {
    /// Short human-readable summary ("no records imported").
    pub summary: String,
    /// Identifier of the specific missing artifact, when one exists
    /// (gap id, questionnaire id, field name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl MissingItem {
    pub fn new(summary: impl Into<String>) -> Self {
        MissingItem {
            summary: summary.into(),
            item_id: None,
        }
    }

    pub fn with_id(summary: impl Into<String>, item_id: impl Into<String>) -> Self {
        MissingItem {
            summary: summary.into(),
            item_id: Some(item_id.into()),
        }
    }
}

/// Outcome of evaluating a gate predicate against committed phase data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    /// Non-empty exactly when the gate failed.
    #[serde(default)]
    pub missing: Vec<MissingItem>,
    /// Computed score for score-based gates, passed or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl GateResult {
    pub fn pass() -> Self {
        GateResult {
            passed: true,
            missing: Vec::new(),
            score: None,
        }
    }

    pub fn pass_with_score(score: f64) -> Self {
        GateResult {
            passed: true,
            missing: Vec::new(),
            score: Some(score),
        }
    }

    pub fn fail(missing: Vec<MissingItem>) -> Self {
        GateResult {
            passed: false,
            missing,
            score: None,
        }
    }

    pub fn fail_with_score(missing: Vec<MissingItem>, score: f64) -> Self {
        GateResult {
            passed: false,
            missing,
            score: Some(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_phase_has_a_gate() {
        let phases = [
            Phase::DataImport,
            Phase::FieldMapping,
            Phase::Enrichment,
            Phase::QuestionnaireGeneration,
            Phase::ResponseCollection,
            Phase::GapAnalysis,
            Phase::ReadinessScoring,
            Phase::StrategyRecommendation,
            Phase::Review,
        ];
        let mut gates: Vec<GateKind> = phases.iter().map(|p| GateKind::for_phase(*p)).collect();
        gates.dedup();
        assert_eq!(gates.len(), phases.len());
    }

    #[test]
    fn input_gates_await_input() {
        assert!(GateKind::RecordsImported.awaits_input());
        assert!(GateKind::ResponsesReceived.awaits_input());
        assert!(GateKind::ReadinessThreshold.awaits_input());
        assert!(GateKind::ReviewApproved.awaits_input());
        assert!(!GateKind::GapClosure.awaits_input());
        assert!(!GateKind::QualityThreshold.awaits_input());
    }

    #[test]
    fn failed_result_carries_missing_items() {
        let result = GateResult::fail(vec![MissingItem::with_id(
            "questionnaire has no responses",
            "q-7",
        )]);
        assert!(!result.passed);
        assert_eq!(result.missing.len(), 1);
        assert_eq!(result.missing[0].item_id.as_deref(), Some("q-7"));
    }
}
