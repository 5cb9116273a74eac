//! Phase executors: one unit of work per phase.
//!
//! An executor receives the flow's accumulated phase data plus any newly
//! supplied input and reports an [`ExecutorOutcome`]. Executors are
//! idempotent over identical input (the controller may re-run one after a
//! partial failure) and never touch `status` or `current_phase`; each writes
//! only its own `phase_data` slot, and only via the controller's commit.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use wayfinder_core::{
    Gap, GapPriority, Phase, PhaseInput, PhaseOutput, QuestionnaireRef,
};

use crate::analysis::{AnalysisError, AnalysisProvider};

/// Source fields every migration record must map before Discovery can
/// leave field mapping.
pub const CRITICAL_FIELDS: &[&str] = &["environment", "os", "dependencies"];

/// The report an executor hands back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorOutcome {
    /// Work done; the produced output goes into this phase's slot.
    Success(PhaseOutput),
    /// The phase needs externally supplied input it does not have
    /// (or was handed input of the wrong kind).
    NeedsInput,
    /// Transient failure; the controller retries with backoff.
    Retryable(String),
    /// Non-recoverable failure; the flow moves to `failed`.
    Fatal(String),
}

/// Read-only view an executor runs against.
pub struct ExecutorContext<'a> {
    /// Committed outputs of all phases so far.
    pub phase_data: &'a BTreeMap<Phase, PhaseOutput>,
    /// Newly supplied external input, when the call came through the
    /// human-input channel.
    pub input: Option<&'a PhaseInput>,
    /// The analysis collaborator, for phases that consult it.
    pub analysis: &'a dyn AnalysisProvider,
}

/// One unit of work for one phase.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    fn phase(&self) -> Phase;
    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome;
}

/// Whether a phase's executor consumes the given input kind.
///
/// The controller routes supplied input to the nearest accepting phase of
/// the flow's sequence, so a corrective import batch reaches the
/// data_import slot even while the flow sits at a later Discovery phase.
pub fn accepts_input(phase: Phase, input: &PhaseInput) -> bool {
    matches!(
        (phase, input),
        (Phase::DataImport, PhaseInput::ImportBatch { .. })
            | (Phase::ReadinessScoring, PhaseInput::ImportBatch { .. })
            | (Phase::ResponseCollection, PhaseInput::QuestionnaireResponses { .. })
            | (Phase::GapAnalysis, PhaseInput::QuestionnaireResponses { .. })
            | (Phase::Review, PhaseInput::ReviewDecision { .. })
    )
}

/// Dispatch to the built-in executor for a phase.
pub fn executor_for(phase: Phase) -> &'static dyn PhaseExecutor {
    match phase {
        Phase::DataImport => &DataImportExecutor,
        Phase::FieldMapping => &FieldMappingExecutor,
        Phase::Enrichment => &EnrichmentExecutor,
        Phase::QuestionnaireGeneration => &QuestionnaireGenerationExecutor,
        Phase::ResponseCollection => &ResponseCollectionExecutor,
        Phase::GapAnalysis => &GapAnalysisExecutor,
        Phase::ReadinessScoring => &ReadinessScoringExecutor,
        Phase::StrategyRecommendation => &StrategyRecommendationExecutor,
        Phase::Review => &ReviewExecutor,
    }
}

// ──────────────────────────────────────────────
// Discovery executors
// ──────────────────────────────────────────────

/// Cleanses an externally supplied import batch into the import summary.
/// Repeat batches accumulate.
pub struct DataImportExecutor;

#[async_trait]
impl PhaseExecutor for DataImportExecutor {
    fn phase(&self) -> Phase {
        Phase::DataImport
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        let (records, source) = match ctx.input {
            Some(PhaseInput::ImportBatch { records, source }) => (records, source),
            _ => return ExecutorOutcome::NeedsInput,
        };

        let (mut imported, mut rejected, mut sources, mut fields) =
            match ctx.phase_data.get(&Phase::DataImport) {
                Some(PhaseOutput::DataImport {
                    records_imported,
                    rejected,
                    sources,
                    fields,
                }) => (
                    *records_imported,
                    *rejected,
                    sources.clone(),
                    fields.iter().cloned().collect::<BTreeSet<_>>(),
                ),
                _ => (0, 0, Vec::new(), BTreeSet::new()),
            };

        for record in records {
            if record.name.trim().is_empty() {
                rejected += 1;
                continue;
            }
            imported += 1;
            fields.extend(record.attributes.keys().cloned());
        }
        if !sources.contains(source) {
            sources.push(source.clone());
        }

        ExecutorOutcome::Success(PhaseOutput::DataImport {
            records_imported: imported,
            rejected,
            sources,
            fields: fields.into_iter().collect(),
        })
    }
}

/// Maps observed source fields onto the canonical schema.
pub struct FieldMappingExecutor;

#[async_trait]
impl PhaseExecutor for FieldMappingExecutor {
    fn phase(&self) -> Phase {
        Phase::FieldMapping
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        // Derived output only; direct input belongs to data_import.
        if ctx.input.is_some() {
            return ExecutorOutcome::NeedsInput;
        }
        let fields = match ctx.phase_data.get(&Phase::DataImport) {
            Some(PhaseOutput::DataImport { fields, .. }) => fields,
            _ => return ExecutorOutcome::Fatal("data import output missing".into()),
        };
        let observed: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
        let unmapped_critical: Vec<String> = CRITICAL_FIELDS
            .iter()
            .filter(|f| !observed.contains(**f))
            .map(|f| f.to_string())
            .collect();
        let present = CRITICAL_FIELDS.len() - unmapped_critical.len();
        let confidence = present as f64 / CRITICAL_FIELDS.len() as f64;
        ExecutorOutcome::Success(PhaseOutput::FieldMapping {
            mapped: observed.len() as u64,
            unmapped_critical,
            confidence,
        })
    }
}

/// Scores the cleansed, mapped inventory for completeness.
pub struct EnrichmentExecutor;

#[async_trait]
impl PhaseExecutor for EnrichmentExecutor {
    fn phase(&self) -> Phase {
        Phase::Enrichment
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        if ctx.input.is_some() {
            return ExecutorOutcome::NeedsInput;
        }
        let (imported, rejected) = match ctx.phase_data.get(&Phase::DataImport) {
            Some(PhaseOutput::DataImport {
                records_imported,
                rejected,
                ..
            }) => (*records_imported, *rejected),
            _ => return ExecutorOutcome::Fatal("data import output missing".into()),
        };
        let confidence = match ctx.phase_data.get(&Phase::FieldMapping) {
            Some(PhaseOutput::FieldMapping { confidence, .. }) => *confidence,
            _ => return ExecutorOutcome::Fatal("field mapping output missing".into()),
        };
        let total = imported + rejected;
        let acceptance = if total == 0 {
            0.0
        } else {
            imported as f64 / total as f64
        };
        ExecutorOutcome::Success(PhaseOutput::Enrichment {
            enriched: imported,
            quality_score: confidence * acceptance,
        })
    }
}

// ──────────────────────────────────────────────
// Collection executors
// ──────────────────────────────────────────────

/// The standard questionnaire set generated for every Collection flow.
fn questionnaire_templates() -> Vec<QuestionnaireRef> {
    vec![
        QuestionnaireRef {
            id: "q-app-inventory".into(),
            title: "Application inventory".into(),
            applications: Vec::new(),
        },
        QuestionnaireRef {
            id: "q-infrastructure".into(),
            title: "Infrastructure details".into(),
            applications: Vec::new(),
        },
        QuestionnaireRef {
            id: "q-business".into(),
            title: "Business criticality".into(),
            applications: Vec::new(),
        },
    ]
}

/// Catalogue of data gaps each questionnaire is meant to close.
fn gap_catalogue() -> Vec<(&'static str, Gap)> {
    vec![
        (
            "q-app-inventory",
            Gap {
                id: "gap-os-versions".into(),
                description: "operating system versions unknown".into(),
                priority: GapPriority::Critical,
                closed: false,
            },
        ),
        (
            "q-app-inventory",
            Gap {
                id: "gap-dependency-map".into(),
                description: "application dependency map incomplete".into(),
                priority: GapPriority::Critical,
                closed: false,
            },
        ),
        (
            "q-infrastructure",
            Gap {
                id: "gap-network-topology".into(),
                description: "network topology not documented".into(),
                priority: GapPriority::High,
                closed: false,
            },
        ),
        (
            "q-business",
            Gap {
                id: "gap-criticality-ratings".into(),
                description: "business criticality ratings missing".into(),
                priority: GapPriority::Medium,
                closed: false,
            },
        ),
    ]
}

/// Generates the questionnaire set. Deterministic; re-runs are no-ops.
pub struct QuestionnaireGenerationExecutor;

#[async_trait]
impl PhaseExecutor for QuestionnaireGenerationExecutor {
    fn phase(&self) -> Phase {
        Phase::QuestionnaireGeneration
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        if ctx.input.is_some() {
            return ExecutorOutcome::NeedsInput;
        }
        ExecutorOutcome::Success(PhaseOutput::QuestionnaireGeneration {
            questionnaires: questionnaire_templates(),
        })
    }
}

/// Tallies supplied questionnaire responses against the generated set.
pub struct ResponseCollectionExecutor;

#[async_trait]
impl PhaseExecutor for ResponseCollectionExecutor {
    fn phase(&self) -> Phase {
        Phase::ResponseCollection
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        let questionnaires = match ctx.phase_data.get(&Phase::QuestionnaireGeneration) {
            Some(PhaseOutput::QuestionnaireGeneration { questionnaires }) => questionnaires,
            _ => return ExecutorOutcome::Fatal("questionnaires not generated".into()),
        };

        let (mut responses, mut gaps_closed) =
            match ctx.phase_data.get(&Phase::ResponseCollection) {
                Some(PhaseOutput::ResponseCollection {
                    responses,
                    gaps_closed,
                }) => (responses.clone(), gaps_closed.clone()),
                _ => {
                    let seeded: BTreeMap<String, u64> = questionnaires
                        .iter()
                        .map(|q| (q.id.clone(), 0))
                        .collect();
                    (seeded, Vec::new())
                }
            };

        match ctx.input {
            None => {}
            Some(PhaseInput::QuestionnaireResponses { responses: supplied }) => {
                for response in supplied {
                    match responses.get_mut(&response.questionnaire_id) {
                        Some(count) => *count += 1,
                        None => {
                            return ExecutorOutcome::Fatal(format!(
                                "response for unknown questionnaire '{}'",
                                response.questionnaire_id
                            ))
                        }
                    }
                    for gap_id in &response.closes_gaps {
                        if !gaps_closed.contains(gap_id) {
                            gaps_closed.push(gap_id.clone());
                        }
                    }
                }
            }
            Some(_) => return ExecutorOutcome::NeedsInput,
        }

        ExecutorOutcome::Success(PhaseOutput::ResponseCollection {
            responses,
            gaps_closed,
        })
    }
}

/// Computes the open-gap list and closure score from collected responses.
///
/// Also accepts late questionnaire responses directly, so gaps can be closed
/// while the flow is paused on the gap-closure gate.
pub struct GapAnalysisExecutor;

#[async_trait]
impl PhaseExecutor for GapAnalysisExecutor {
    fn phase(&self) -> Phase {
        Phase::GapAnalysis
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        let mut closed: BTreeSet<String> = match ctx.phase_data.get(&Phase::ResponseCollection)
        {
            Some(PhaseOutput::ResponseCollection { gaps_closed, .. }) => {
                gaps_closed.iter().cloned().collect()
            }
            _ => return ExecutorOutcome::Fatal("response collection output missing".into()),
        };
        // Carry closures recorded by earlier gap-analysis runs.
        if let Some(PhaseOutput::GapAnalysis { gaps, .. }) =
            ctx.phase_data.get(&Phase::GapAnalysis)
        {
            closed.extend(gaps.iter().filter(|g| g.closed).map(|g| g.id.clone()));
        }
        match ctx.input {
            None => {}
            Some(PhaseInput::QuestionnaireResponses { responses }) => {
                for response in responses {
                    closed.extend(response.closes_gaps.iter().cloned());
                }
            }
            Some(_) => return ExecutorOutcome::NeedsInput,
        }

        let gaps: Vec<Gap> = gap_catalogue()
            .into_iter()
            .map(|(_, mut gap)| {
                gap.closed = closed.contains(&gap.id);
                gap
            })
            .collect();
        let closed_count = gaps.iter().filter(|g| g.closed).count();
        let closure_score = closed_count as f64 / gaps.len() as f64;
        ExecutorOutcome::Success(PhaseOutput::GapAnalysis {
            gaps,
            closure_score,
        })
    }
}

// ──────────────────────────────────────────────
// Assessment executors
// ──────────────────────────────────────────────

/// Scores a supplied application portfolio for migration readiness.
pub struct ReadinessScoringExecutor;

#[async_trait]
impl PhaseExecutor for ReadinessScoringExecutor {
    fn phase(&self) -> Phase {
        Phase::ReadinessScoring
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        let records = match ctx.input {
            Some(PhaseInput::ImportBatch { records, .. }) => records,
            _ => return ExecutorOutcome::NeedsInput,
        };
        let mut applications = Vec::new();
        let mut blockers = Vec::new();
        let mut complete = 0u64;
        for record in records {
            if record.name.trim().is_empty() {
                continue;
            }
            applications.push(record.name.clone());
            let missing: Vec<&str> = CRITICAL_FIELDS
                .iter()
                .filter(|f| !record.attributes.contains_key(**f))
                .copied()
                .collect();
            if missing.is_empty() {
                complete += 1;
            } else {
                blockers.push(format!(
                    "'{}' is missing {}",
                    record.name,
                    missing.join(", ")
                ));
            }
        }
        let score = if applications.is_empty() {
            0.0
        } else {
            complete as f64 / applications.len() as f64
        };
        ExecutorOutcome::Success(PhaseOutput::ReadinessScoring {
            score,
            blockers,
            applications,
        })
    }
}

/// Asks the analysis collaborator for one 6R call per application.
pub struct StrategyRecommendationExecutor;

#[async_trait]
impl PhaseExecutor for StrategyRecommendationExecutor {
    fn phase(&self) -> Phase {
        Phase::StrategyRecommendation
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        if ctx.input.is_some() {
            return ExecutorOutcome::NeedsInput;
        }
        let (score, blockers, applications) =
            match ctx.phase_data.get(&Phase::ReadinessScoring) {
                Some(PhaseOutput::ReadinessScoring {
                    score,
                    blockers,
                    applications,
                }) => (*score, blockers.clone(), applications.clone()),
                _ => return ExecutorOutcome::Fatal("readiness scoring output missing".into()),
            };
        match ctx.analysis.recommend(&applications, score, &blockers).await {
            Ok(recommendations) => {
                ExecutorOutcome::Success(PhaseOutput::StrategyRecommendation {
                    recommendations,
                })
            }
            Err(AnalysisError::Retryable(message)) => ExecutorOutcome::Retryable(message),
            Err(AnalysisError::Fatal(message)) => ExecutorOutcome::Fatal(message),
        }
    }
}

/// Records the human review decision over the recommended strategies.
pub struct ReviewExecutor;

#[async_trait]
impl PhaseExecutor for ReviewExecutor {
    fn phase(&self) -> Phase {
        Phase::Review
    }

    async fn run(&self, ctx: ExecutorContext<'_>) -> ExecutorOutcome {
        match ctx.input {
            Some(PhaseInput::ReviewDecision { approved, notes }) => {
                ExecutorOutcome::Success(PhaseOutput::Review {
                    approved: *approved,
                    notes: notes.clone(),
                })
            }
            _ => ExecutorOutcome::NeedsInput,
        }
    }
}
