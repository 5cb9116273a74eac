//! Typed per-phase outputs.
//!
//! Phase outputs are a tagged union keyed by phase name rather than an
//! open-ended map, so downstream phases get structural guarantees about
//! what an earlier phase produced.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flow::Phase;

/// Reference to one generated questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireRef {
    pub id: String,
    pub title: String,
    /// Applications this questionnaire covers.
    #[serde(default)]
    pub applications: Vec<String>,
}

/// Priority of an identified data gap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GapPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// One identified data gap from gap analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub id: String,
    pub description: String,
    pub priority: GapPriority,
    /// Whether the gap has been closed by later input.
    #[serde(default)]
    pub closed: bool,
}

/// The six migration-treatment categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SixR {
    Rehost,
    Replatform,
    Refactor,
    Repurchase,
    Retain,
    Retire,
}

impl SixR {
    pub fn as_str(&self) -> &'static str {
        match self {
            SixR::Rehost => "rehost",
            SixR::Replatform => "replatform",
            SixR::Refactor => "refactor",
            SixR::Repurchase => "repurchase",
            SixR::Retain => "retain",
            SixR::Retire => "retire",
        }
    }
}

impl fmt::Display for SixR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy recommendation for one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCall {
    pub application: String,
    pub strategy: SixR,
    /// Provider confidence in [0, 1].
    pub confidence: f64,
    pub rationale: String,
}

/// The typed output of one phase.
///
/// Serialized with an internal `phase` tag whose value matches the
/// snake_case phase name, so stored `phase_data` slots are self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOutput {
    DataImport {
        records_imported: u64,
        rejected: u64,
        sources: Vec<String>,
        /// Union of attribute keys observed across imported records;
        /// consumed by field mapping.
        #[serde(default)]
        fields: Vec<String>,
    },
    FieldMapping {
        mapped: u64,
        /// Critical source fields with no target mapping.
        unmapped_critical: Vec<String>,
        confidence: f64,
    },
    Enrichment {
        enriched: u64,
        quality_score: f64,
    },
    QuestionnaireGeneration {
        questionnaires: Vec<QuestionnaireRef>,
    },
    ResponseCollection {
        /// Response count per questionnaire id.
        responses: BTreeMap<String, u64>,
        /// Gap ids closed by the recorded responses.
        #[serde(default)]
        gaps_closed: Vec<String>,
    },
    GapAnalysis {
        gaps: Vec<Gap>,
        closure_score: f64,
    },
    ReadinessScoring {
        score: f64,
        blockers: Vec<String>,
        /// Applications in the assessed portfolio; consumed by the
        /// strategy recommendation executor.
        #[serde(default)]
        applications: Vec<String>,
    },
    StrategyRecommendation {
        recommendations: Vec<StrategyCall>,
    },
    Review {
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl PhaseOutput {
    /// The phase this output belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            PhaseOutput::DataImport { .. } => Phase::DataImport,
            PhaseOutput::FieldMapping { .. } => Phase::FieldMapping,
            PhaseOutput::Enrichment { .. } => Phase::Enrichment,
            PhaseOutput::QuestionnaireGeneration { .. } => Phase::QuestionnaireGeneration,
            PhaseOutput::ResponseCollection { .. } => Phase::ResponseCollection,
            PhaseOutput::GapAnalysis { .. } => Phase::GapAnalysis,
            PhaseOutput::ReadinessScoring { .. } => Phase::ReadinessScoring,
            PhaseOutput::StrategyRecommendation { .. } => Phase::StrategyRecommendation,
            PhaseOutput::Review { .. } => Phase::Review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_tag_matches_phase_name() {
        let output = PhaseOutput::GapAnalysis {
            gaps: vec![Gap {
                id: "gap-1".into(),
                description: "missing OS version".into(),
                priority: GapPriority::Critical,
                closed: false,
            }],
            closure_score: 0.4,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["phase"], "gap_analysis");
        assert_eq!(output.phase().as_str(), "gap_analysis");
    }

    #[test]
    fn output_round_trips() {
        let output = PhaseOutput::StrategyRecommendation {
            recommendations: vec![StrategyCall {
                application: "billing".into(),
                strategy: SixR::Replatform,
                confidence: 0.82,
                rationale: "managed database candidate".into(),
            }],
        };
        let json = serde_json::to_string(&output).unwrap();
        let back: PhaseOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn gap_priority_orders_by_severity() {
        assert!(GapPriority::Critical > GapPriority::High);
        assert!(GapPriority::High > GapPriority::Medium);
        assert!(GapPriority::Medium > GapPriority::Low);
    }
}
