//! The human-input channel: externally supplied artifacts for input phases.
//!
//! While a flow is paused awaiting input, the caller submits one of these
//! payloads; the executor of the phase that consumes the kind turns it into
//! (or merges it into) that phase's typed output, after which the gate is
//! re-evaluated on the next `advance`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One raw inventory record supplied to a Discovery import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub name: String,
    pub source: String,
    /// Free-form source attributes; typed mapping happens in field_mapping.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Recorded answers for one questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub questionnaire_id: String,
    pub respondent: String,
    #[serde(default)]
    pub answers: BTreeMap<String, serde_json::Value>,
    /// Gap ids this response closes, per the questionnaire's gap links.
    #[serde(default)]
    pub closes_gaps: Vec<String>,
}

/// Externally supplied input, routed to its consuming phase's executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseInput {
    ImportBatch {
        records: Vec<ImportRecord>,
        source: String,
    },
    QuestionnaireResponses {
        responses: Vec<QuestionnaireResponse>,
    },
    ReviewDecision {
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl PhaseInput {
    /// Wire name of this input kind, matching the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            PhaseInput::ImportBatch { .. } => "import_batch",
            PhaseInput::QuestionnaireResponses { .. } => "questionnaire_responses",
            PhaseInput::ReviewDecision { .. } => "review_decision",
        }
    }
}
