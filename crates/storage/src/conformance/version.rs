use std::future::Future;

use wayfinder_core::FlowStatus;

use super::{make_record, TestResult};
use crate::{FlowStore, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "save_with_expected_version_increments",
        save_with_expected_version_increments(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "save_with_stale_version_conflicts",
        save_with_stale_version_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_leaves_stored_record_untouched",
        conflict_leaves_stored_record_untouched(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "refetch_after_conflict_succeeds",
        refetch_after_conflict_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "save_missing_flow_returns_not_found",
        save_missing_flow_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "versions_increment_monotonically",
        versions_increment_monotonically(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A save conditional on the current version succeeds and bumps it by one.
async fn save_with_expected_version_increments<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-v"))
        .await
        .map_err(|e| e.to_string())?;
    let mut rec = s.get("flow-v").await.map_err(|e| e.to_string())?;
    rec.status = FlowStatus::Running;
    let new_version = s.save(rec, 0).await.map_err(|e| e.to_string())?;
    if new_version != 1 {
        return Err(format!("expected new version 1, got {new_version}"));
    }
    let stored = s.get("flow-v").await.map_err(|e| e.to_string())?;
    if stored.version != 1 || stored.status != FlowStatus::Running {
        return Err("saved record not visible".to_string());
    }
    Ok(())
}

/// A save conditional on a stale version must return VersionConflict.
async fn save_with_stale_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-stale"))
        .await
        .map_err(|e| e.to_string())?;
    let rec = s.get("flow-stale").await.map_err(|e| e.to_string())?;
    s.save(rec.clone(), 0).await.map_err(|e| e.to_string())?;

    // Second writer still holds version 0.
    match s.save(rec, 0).await {
        Err(StorageError::VersionConflict {
            flow_id,
            expected_version,
        }) if flow_id == "flow-stale" && expected_version == 0 => Ok(()),
        Err(e) => Err(format!("expected VersionConflict, got {e}")),
        Ok(v) => Err(format!("expected VersionConflict, got Ok({v})")),
    }
}

/// A conflicted save must not partially apply.
async fn conflict_leaves_stored_record_untouched<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-atomic"))
        .await
        .map_err(|e| e.to_string())?;
    let mut winner = s.get("flow-atomic").await.map_err(|e| e.to_string())?;
    winner.status = FlowStatus::Running;
    s.save(winner, 0).await.map_err(|e| e.to_string())?;

    let mut loser = make_record("flow-atomic");
    loser.status = FlowStatus::Cancelled;
    let _ = s.save(loser, 0).await;

    let stored = s.get("flow-atomic").await.map_err(|e| e.to_string())?;
    if stored.status != FlowStatus::Running || stored.version != 1 {
        return Err(format!(
            "conflicted save leaked: status {} version {}",
            stored.status, stored.version
        ));
    }
    Ok(())
}

/// Re-fetching after a conflict and saving against the fresh version works.
async fn refetch_after_conflict_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-retry"))
        .await
        .map_err(|e| e.to_string())?;
    let rec = s.get("flow-retry").await.map_err(|e| e.to_string())?;
    s.save(rec.clone(), 0).await.map_err(|e| e.to_string())?;

    if s.save(rec, 0).await.is_ok() {
        return Err("stale save unexpectedly succeeded".to_string());
    }
    let fresh = s.get("flow-retry").await.map_err(|e| e.to_string())?;
    let v = s
        .save(fresh.clone(), fresh.version)
        .await
        .map_err(|e| e.to_string())?;
    if v != 2 {
        return Err(format!("expected version 2 after retry, got {v}"));
    }
    Ok(())
}

/// Saving a flow that does not exist must return NotFound.
async fn save_missing_flow_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.save(make_record("flow-ghost"), 0).await {
        Err(StorageError::NotFound { flow_id }) if flow_id == "flow-ghost" => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(v) => Err(format!("expected NotFound, got Ok({v})")),
    }
}

/// A chain of saves produces versions 1, 2, 3, ...
async fn versions_increment_monotonically<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-mono"))
        .await
        .map_err(|e| e.to_string())?;
    for expected in 0..5 {
        let rec = s.get("flow-mono").await.map_err(|e| e.to_string())?;
        if rec.version != expected {
            return Err(format!("expected version {expected}, got {}", rec.version));
        }
        s.save(rec, expected).await.map_err(|e| e.to_string())?;
    }
    Ok(())
}
