use std::future::Future;

use super::{make_dependent, make_record, TestResult};
use crate::{FlowStore, StorageError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "delete",
        "delete_without_dependents_succeeds",
        delete_without_dependents_succeeds(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "unforced_delete_with_dependents_fails",
        unforced_delete_with_dependents_fails(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "failed_delete_removes_nothing",
        failed_delete_removes_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "forced_delete_cascades",
        forced_delete_cascades(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "delete_missing_flow_returns_not_found",
        delete_missing_flow_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "delete",
        "dependent_for_missing_flow_rejected",
        dependent_for_missing_flow_rejected(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A flow with no dependents deletes cleanly even without force.
async fn delete_without_dependents_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-del"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete("flow-del", false).await.map_err(|e| e.to_string())?;
    match s.get("flow-del").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        _ => Err("flow still readable after delete".to_string()),
    }
}

/// With force = false and a dependent present, delete must fail with
/// HasDependents carrying the dependent count.
async fn unforced_delete_with_dependents_fails<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-dep"))
        .await
        .map_err(|e| e.to_string())?;
    s.add_dependent(make_dependent("resp-1", "flow-dep"))
        .await
        .map_err(|e| e.to_string())?;
    match s.delete("flow-dep", false).await {
        Err(StorageError::HasDependents { flow_id, dependents })
            if flow_id == "flow-dep" && dependents == 1 =>
        {
            Ok(())
        }
        Err(e) => Err(format!("expected HasDependents, got {e}")),
        Ok(()) => Err("expected HasDependents, got Ok".to_string()),
    }
}

/// A blocked delete must leave both the flow and its dependents intact.
async fn failed_delete_removes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-keep"))
        .await
        .map_err(|e| e.to_string())?;
    s.add_dependent(make_dependent("resp-1", "flow-keep"))
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.delete("flow-keep", false).await;

    s.get("flow-keep").await.map_err(|e| e.to_string())?;
    let count = s
        .count_dependents("flow-keep")
        .await
        .map_err(|e| e.to_string())?;
    if count != 1 {
        return Err(format!("expected 1 surviving dependent, got {count}"));
    }
    Ok(())
}

/// force = true removes the flow, its dependents, and its audit rows.
async fn forced_delete_cascades<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-force"))
        .await
        .map_err(|e| e.to_string())?;
    s.add_dependent(make_dependent("resp-1", "flow-force"))
        .await
        .map_err(|e| e.to_string())?;
    s.add_dependent(make_dependent("resp-2", "flow-force"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete("flow-force", true)
        .await
        .map_err(|e| e.to_string())?;

    if s.get("flow-force").await.is_ok() {
        return Err("flow survived forced delete".to_string());
    }
    let count = s
        .count_dependents("flow-force")
        .await
        .map_err(|e| e.to_string())?;
    if count != 0 {
        return Err(format!("expected 0 dependents after cascade, got {count}"));
    }
    Ok(())
}

/// Deleting an unknown flow_id must return NotFound, not crash.
async fn delete_missing_flow_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.delete("flow-gone", false).await {
        Err(StorageError::NotFound { flow_id }) if flow_id == "flow-gone" => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(()) => Err("expected NotFound, got Ok".to_string()),
    }
}

/// Dependents are foreign-keyed by flow_id; an orphan insert is rejected.
async fn dependent_for_missing_flow_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.add_dependent(make_dependent("resp-1", "flow-orphan")).await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(()) => Err("orphan dependent accepted".to_string()),
    }
}
