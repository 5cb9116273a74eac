//! Gate predicate library.
//!
//! Each predicate is a pure function of the accumulated `phase_data`:
//! deterministic, side-effect-free, and unit-testable without a live flow.
//! A failed gate enumerates every concrete blocker so the caller always has
//! a next action, never a bare "blocked".

use std::collections::BTreeMap;

use wayfinder_core::{
    GapPriority, GateKind, GateResult, MissingItem, Phase, PhaseOutput,
};

/// Minimum enrichment quality score to complete Discovery.
pub const QUALITY_THRESHOLD: f64 = 0.7;

/// Minimum gap-closure score to complete Collection.
pub const GAP_CLOSURE_THRESHOLD: f64 = 0.6;

/// Minimum readiness score to proceed to strategy recommendation.
pub const READINESS_THRESHOLD: f64 = 0.6;

type PhaseData = BTreeMap<Phase, PhaseOutput>;

/// Evaluate the gate guarding completion of `phase`.
pub fn evaluate(phase: Phase, data: &PhaseData) -> GateResult {
    match GateKind::for_phase(phase) {
        GateKind::RecordsImported => records_imported(data),
        GateKind::MappingsResolved => mappings_resolved(data),
        GateKind::QualityThreshold => quality_threshold(data),
        GateKind::QuestionnairesGenerated => questionnaires_generated(data),
        GateKind::ResponsesReceived => responses_received(data),
        GateKind::GapClosure => gap_closure(data),
        GateKind::ReadinessThreshold => readiness_threshold(data),
        GateKind::StrategiesAssigned => strategies_assigned(data),
        GateKind::ReviewApproved => review_approved(data),
    }
}

fn records_imported(data: &PhaseData) -> GateResult {
    match data.get(&Phase::DataImport) {
        Some(PhaseOutput::DataImport {
            records_imported, ..
        }) if *records_imported > 0 => GateResult::pass(),
        _ => GateResult::fail(vec![MissingItem::new("no records imported")]),
    }
}

fn mappings_resolved(data: &PhaseData) -> GateResult {
    match data.get(&Phase::FieldMapping) {
        Some(PhaseOutput::FieldMapping {
            unmapped_critical, ..
        }) => {
            if unmapped_critical.is_empty() {
                GateResult::pass()
            } else {
                GateResult::fail(
                    unmapped_critical
                        .iter()
                        .map(|field| {
                            MissingItem::with_id(
                                format!("critical field '{field}' is unmapped"),
                                field.clone(),
                            )
                        })
                        .collect(),
                )
            }
        }
        _ => GateResult::fail(vec![MissingItem::new("field mapping not computed")]),
    }
}

fn quality_threshold(data: &PhaseData) -> GateResult {
    match data.get(&Phase::Enrichment) {
        Some(PhaseOutput::Enrichment { quality_score, .. }) => {
            if *quality_score >= QUALITY_THRESHOLD {
                GateResult::pass_with_score(*quality_score)
            } else {
                GateResult::fail_with_score(
                    vec![MissingItem::new(format!(
                        "quality score {quality_score:.2} below threshold {QUALITY_THRESHOLD}"
                    ))],
                    *quality_score,
                )
            }
        }
        _ => GateResult::fail(vec![MissingItem::new("enrichment not computed")]),
    }
}

fn questionnaires_generated(data: &PhaseData) -> GateResult {
    match data.get(&Phase::QuestionnaireGeneration) {
        Some(PhaseOutput::QuestionnaireGeneration { questionnaires })
            if !questionnaires.is_empty() =>
        {
            GateResult::pass()
        }
        _ => GateResult::fail(vec![MissingItem::new("no questionnaires generated")]),
    }
}

fn responses_received(data: &PhaseData) -> GateResult {
    let questionnaires = match data.get(&Phase::QuestionnaireGeneration) {
        Some(PhaseOutput::QuestionnaireGeneration { questionnaires }) => questionnaires,
        _ => {
            return GateResult::fail(vec![MissingItem::new("no questionnaires generated")]);
        }
    };
    let responses = match data.get(&Phase::ResponseCollection) {
        Some(PhaseOutput::ResponseCollection { responses, .. }) => responses.clone(),
        _ => BTreeMap::new(),
    };
    let missing: Vec<MissingItem> = questionnaires
        .iter()
        .filter(|q| responses.get(&q.id).copied().unwrap_or(0) == 0)
        .map(|q| {
            MissingItem::with_id(
                format!("questionnaire '{}' has no recorded response", q.title),
                q.id.clone(),
            )
        })
        .collect();
    if missing.is_empty() {
        GateResult::pass()
    } else {
        GateResult::fail(missing)
    }
}

fn gap_closure(data: &PhaseData) -> GateResult {
    match data.get(&Phase::GapAnalysis) {
        Some(PhaseOutput::GapAnalysis {
            gaps,
            closure_score,
        }) => {
            let mut missing: Vec<MissingItem> = gaps
                .iter()
                .filter(|g| g.priority == GapPriority::Critical && !g.closed)
                .map(|g| {
                    MissingItem::with_id(
                        format!("critical gap open: {}", g.description),
                        g.id.clone(),
                    )
                })
                .collect();
            if *closure_score < GAP_CLOSURE_THRESHOLD {
                missing.push(MissingItem::new(format!(
                    "gap-closure score {closure_score:.2} below threshold {GAP_CLOSURE_THRESHOLD}"
                )));
            }
            if missing.is_empty() {
                GateResult::pass_with_score(*closure_score)
            } else {
                GateResult::fail_with_score(missing, *closure_score)
            }
        }
        _ => GateResult::fail(vec![MissingItem::new("gap analysis not computed")]),
    }
}

fn readiness_threshold(data: &PhaseData) -> GateResult {
    match data.get(&Phase::ReadinessScoring) {
        Some(PhaseOutput::ReadinessScoring {
            score, blockers, ..
        }) => {
            let mut missing: Vec<MissingItem> = blockers
                .iter()
                .map(|b| MissingItem::new(format!("readiness blocker: {b}")))
                .collect();
            if *score < READINESS_THRESHOLD {
                missing.push(MissingItem::new(format!(
                    "readiness score {score:.2} below threshold {READINESS_THRESHOLD}"
                )));
            }
            if missing.is_empty() {
                GateResult::pass_with_score(*score)
            } else {
                GateResult::fail_with_score(missing, *score)
            }
        }
        _ => GateResult::fail(vec![MissingItem::new("no portfolio records to score")]),
    }
}

fn strategies_assigned(data: &PhaseData) -> GateResult {
    let applications = match data.get(&Phase::ReadinessScoring) {
        Some(PhaseOutput::ReadinessScoring { applications, .. }) => applications,
        _ => {
            return GateResult::fail(vec![MissingItem::new("no portfolio records to score")]);
        }
    };
    let recommendations = match data.get(&Phase::StrategyRecommendation) {
        Some(PhaseOutput::StrategyRecommendation { recommendations }) => recommendations,
        _ => {
            return GateResult::fail(vec![MissingItem::new(
                "strategy recommendations not computed",
            )]);
        }
    };
    let missing: Vec<MissingItem> = applications
        .iter()
        .filter(|app| !recommendations.iter().any(|r| r.application == **app))
        .map(|app| {
            MissingItem::with_id(
                format!("application '{app}' has no strategy recommendation"),
                app.clone(),
            )
        })
        .collect();
    if missing.is_empty() {
        GateResult::pass()
    } else {
        GateResult::fail(missing)
    }
}

fn review_approved(data: &PhaseData) -> GateResult {
    match data.get(&Phase::Review) {
        Some(PhaseOutput::Review { approved: true, .. }) => GateResult::pass(),
        Some(PhaseOutput::Review {
            approved: false, ..
        }) => GateResult::fail(vec![MissingItem::new("review not approved")]),
        _ => GateResult::fail(vec![MissingItem::new("no review decision recorded")]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_core::{Gap, QuestionnaireRef};

    fn with_output(output: PhaseOutput) -> PhaseData {
        let mut data = BTreeMap::new();
        data.insert(output.phase(), output);
        data
    }

    #[test]
    fn records_imported_fails_on_empty_flow() {
        let result = evaluate(Phase::DataImport, &BTreeMap::new());
        assert!(!result.passed);
        assert_eq!(result.missing[0].summary, "no records imported");
    }

    #[test]
    fn records_imported_passes_with_records() {
        let data = with_output(PhaseOutput::DataImport {
            records_imported: 12,
            rejected: 1,
            sources: vec!["cmdb".into()],
            fields: vec!["name".into()],
        });
        assert!(evaluate(Phase::DataImport, &data).passed);
    }

    #[test]
    fn mappings_resolved_enumerates_unmapped_fields() {
        let data = with_output(PhaseOutput::FieldMapping {
            mapped: 4,
            unmapped_critical: vec!["environment".into(), "os".into()],
            confidence: 0.5,
        });
        let result = evaluate(Phase::FieldMapping, &data);
        assert!(!result.passed);
        assert_eq!(result.missing.len(), 2);
        assert_eq!(result.missing[0].item_id.as_deref(), Some("environment"));
    }

    #[test]
    fn quality_threshold_passes_at_or_above() {
        let data = with_output(PhaseOutput::Enrichment {
            enriched: 10,
            quality_score: 0.7,
        });
        let result = evaluate(Phase::Enrichment, &data);
        assert!(result.passed);
        assert_eq!(result.score, Some(0.7));
    }

    #[test]
    fn responses_received_lists_each_unanswered_questionnaire() {
        let mut data = with_output(PhaseOutput::QuestionnaireGeneration {
            questionnaires: vec![
                QuestionnaireRef {
                    id: "q-1".into(),
                    title: "Application inventory".into(),
                    applications: vec![],
                },
                QuestionnaireRef {
                    id: "q-2".into(),
                    title: "Infrastructure".into(),
                    applications: vec![],
                },
            ],
        });
        let mut responses = BTreeMap::new();
        responses.insert("q-1".to_string(), 2u64);
        responses.insert("q-2".to_string(), 0u64);
        data.insert(
            Phase::ResponseCollection,
            PhaseOutput::ResponseCollection {
                responses,
                gaps_closed: vec![],
            },
        );
        let result = evaluate(Phase::ResponseCollection, &data);
        assert!(!result.passed);
        assert_eq!(result.missing.len(), 1);
        assert_eq!(result.missing[0].item_id.as_deref(), Some("q-2"));
    }

    #[test]
    fn gap_closure_passes_above_threshold_without_critical_gaps() {
        let data = with_output(PhaseOutput::GapAnalysis {
            gaps: vec![Gap {
                id: "gap-1".into(),
                description: "minor detail".into(),
                priority: GapPriority::Low,
                closed: false,
            }],
            closure_score: 0.9,
        });
        let result = evaluate(Phase::GapAnalysis, &data);
        assert!(result.passed);
        assert_eq!(result.score, Some(0.9));
    }

    #[test]
    fn gap_closure_blocks_on_open_critical_gap_even_with_high_score() {
        let data = with_output(PhaseOutput::GapAnalysis {
            gaps: vec![Gap {
                id: "gap-9".into(),
                description: "no OS inventory".into(),
                priority: GapPriority::Critical,
                closed: false,
            }],
            closure_score: 0.95,
        });
        let result = evaluate(Phase::GapAnalysis, &data);
        assert!(!result.passed);
        assert_eq!(result.missing[0].item_id.as_deref(), Some("gap-9"));
    }

    #[test]
    fn review_gate_distinguishes_missing_from_rejected() {
        let none = evaluate(Phase::Review, &BTreeMap::new());
        assert_eq!(none.missing[0].summary, "no review decision recorded");

        let rejected = evaluate(
            Phase::Review,
            &with_output(PhaseOutput::Review {
                approved: false,
                notes: None,
            }),
        );
        assert_eq!(rejected.missing[0].summary, "review not approved");
    }

    #[test]
    fn predicates_are_deterministic() {
        let data = with_output(PhaseOutput::Enrichment {
            enriched: 3,
            quality_score: 0.42,
        });
        let first = evaluate(Phase::Enrichment, &data);
        let second = evaluate(Phase::Enrichment, &data);
        assert_eq!(first, second);
    }
}
