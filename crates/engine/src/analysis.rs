//! The analysis collaborator seam.
//!
//! Strategy recommendations come from an external analysis system treated as
//! a black box: it returns structured data or a retryable/fatal error, and
//! the engine never depends on its internal reasoning. The built-in
//! [`HeuristicProvider`] is deterministic so the lifecycle is fully testable
//! without that system.

use async_trait::async_trait;

use wayfinder_core::{SixR, StrategyCall};

/// Failure modes of an analysis call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// Transient failure (timeout, throttling); safe to retry.
    #[error("retryable analysis error: {0}")]
    Retryable(String),
    /// Non-recoverable failure.
    #[error("fatal analysis error: {0}")]
    Fatal(String),
}

/// Black-box recommendation provider.
#[async_trait]
pub trait AnalysisProvider: Send + Sync + 'static {
    /// Produce one 6R strategy call per application.
    ///
    /// Must be safe to invoke repeatedly with identical input: the engine
    /// retries retryable failures.
    async fn recommend(
        &self,
        applications: &[String],
        readiness_score: f64,
        blockers: &[String],
    ) -> Result<Vec<StrategyCall>, AnalysisError>;
}

/// Deterministic rule-based provider used when no external analysis
/// system is wired in.
#[derive(Debug, Default)]
pub struct HeuristicProvider;

#[async_trait]
impl AnalysisProvider for HeuristicProvider {
    async fn recommend(
        &self,
        applications: &[String],
        readiness_score: f64,
        blockers: &[String],
    ) -> Result<Vec<StrategyCall>, AnalysisError> {
        let calls = applications
            .iter()
            .map(|app| heuristic_call(app, readiness_score, blockers))
            .collect();
        Ok(calls)
    }
}

fn heuristic_call(application: &str, readiness_score: f64, blockers: &[String]) -> StrategyCall {
    let name = application.to_ascii_lowercase();
    let (strategy, confidence, rationale) = if name.contains("legacy")
        || name.contains("deprecated")
    {
        (
            SixR::Retire,
            0.7,
            "application is flagged as legacy; decommission rather than migrate".to_string(),
        )
    } else if name.ends_with("-saas") || name.contains("crm") {
        (
            SixR::Repurchase,
            0.65,
            "commodity capability with an established SaaS replacement".to_string(),
        )
    } else if !blockers.is_empty() {
        (
            SixR::Retain,
            0.5,
            format!("unresolved readiness blockers: {}", blockers.join(", ")),
        )
    } else if readiness_score >= 0.8 {
        (
            SixR::Rehost,
            0.9,
            "high readiness; lift-and-shift is low risk".to_string(),
        )
    } else if readiness_score >= READINESS_MIDBAND {
        (
            SixR::Replatform,
            0.75,
            "moderate readiness; targeted platform changes recommended".to_string(),
        )
    } else {
        (
            SixR::Refactor,
            0.6,
            "low readiness; architectural rework needed before migration".to_string(),
        )
    };
    StrategyCall {
        application: application.to_string(),
        strategy,
        confidence,
        rationale,
    }
}

const READINESS_MIDBAND: f64 = 0.6;
