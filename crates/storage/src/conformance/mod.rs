//! Conformance test suite for `FlowStore` implementations.
//!
//! A backend-agnostic suite any `FlowStore` implementation can run to verify
//! correctness. The suite covers:
//!
//! - **Initialization**: insert at version 0, duplicate detection, round-trip
//! - **Version validation / OCC**: conditional saves, conflict detection
//! - **Deletion**: dependent blocking, forced cascade
//! - **Concurrency**: at-most-one winner per version, delete/save races
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use wayfinder_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert_eq!(report.failed, 0, "{report}");
//! }
//! ```

mod concurrent;
mod delete;
mod init;
mod version;

use std::fmt;
use std::future::Future;

use wayfinder_core::{FlowRecord, FlowType, TenantContext};

use crate::record::DependentRecord;
use crate::FlowStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "version", "delete").
    pub category: String,
    /// Test name (e.g. "insert_creates_flow_at_version_0").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => Self {
                category: category.to_string(),
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(delete::run_delete_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn test_tenant() -> TenantContext {
    TenantContext::new("acct-test", "eng-test")
}

fn make_record(flow_id: &str) -> FlowRecord {
    FlowRecord::new(flow_id.to_string(), FlowType::Discovery, test_tenant())
}

fn make_dependent(id: &str, flow_id: &str) -> DependentRecord {
    DependentRecord {
        id: id.to_string(),
        flow_id: flow_id.to_string(),
        questionnaire_id: "q-test".to_string(),
        respondent: "owner@example.com".to_string(),
        recorded_at: "2026-01-01T00:00:00Z".to_string(),
    }
}
