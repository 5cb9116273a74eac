use std::future::Future;

use wayfinder_core::{FlowStatus, Phase};

use super::{make_record, test_tenant, TestResult};
use crate::{FlowStore, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_creates_flow_at_version_0",
        insert_creates_flow_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "inserted_flow_round_trips_identically",
        inserted_flow_round_trips_identically(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "double_insert_returns_already_exists",
        double_insert_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "get_missing_flow_returns_not_found",
        get_missing_flow_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "different_flows_are_independent",
        different_flows_are_independent(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "list_filters_by_tenant",
        list_filters_by_tenant(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// After insert, the stored version must be 0.
async fn insert_creates_flow_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-a"))
        .await
        .map_err(|e| e.to_string())?;
    let rec = s.get("flow-a").await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    Ok(())
}

/// Reading back an inserted record must reproduce status, phase,
/// completion flags, and phase data exactly.
async fn inserted_flow_round_trips_identically<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record("flow-rt");
    s.insert(record.clone()).await.map_err(|e| e.to_string())?;
    let back = s.get("flow-rt").await.map_err(|e| e.to_string())?;
    if back.status != FlowStatus::Initialized {
        return Err(format!("status changed: {}", back.status));
    }
    if back.current_phase != Phase::DataImport {
        return Err(format!("phase changed: {}", back.current_phase));
    }
    if back.phase_completion != record.phase_completion {
        return Err("phase_completion changed".to_string());
    }
    if back.phase_data != record.phase_data {
        return Err("phase_data changed".to_string());
    }
    Ok(())
}

/// Inserting the same flow_id twice must return AlreadyExists.
async fn double_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-dup"))
        .await
        .map_err(|e| e.to_string())?;
    match s.insert(make_record("flow-dup")).await {
        Err(StorageError::AlreadyExists { flow_id }) if flow_id == "flow-dup" => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("expected AlreadyExists, got Ok".to_string()),
    }
}

/// Getting an unknown flow_id must return NotFound.
async fn get_missing_flow_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("flow-missing").await {
        Err(StorageError::NotFound { flow_id }) if flow_id == "flow-missing" => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(_) => Err("expected NotFound, got a record".to_string()),
    }
}

/// Saving one flow must not disturb another.
async fn different_flows_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-x"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(make_record("flow-y"))
        .await
        .map_err(|e| e.to_string())?;

    let mut x = s.get("flow-x").await.map_err(|e| e.to_string())?;
    x.status = FlowStatus::Running;
    s.save(x, 0).await.map_err(|e| e.to_string())?;

    let y = s.get("flow-y").await.map_err(|e| e.to_string())?;
    if y.version != 0 || y.status != FlowStatus::Initialized {
        return Err("unrelated flow was modified".to_string());
    }
    Ok(())
}

/// `list` returns only the requesting tenant's flows.
async fn list_filters_by_tenant<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(make_record("flow-mine"))
        .await
        .map_err(|e| e.to_string())?;

    let mut other = make_record("flow-theirs");
    other.tenant = wayfinder_core::TenantContext::new("acct-other", "eng-other");
    s.insert(other).await.map_err(|e| e.to_string())?;

    let mine = s.list(&test_tenant()).await.map_err(|e| e.to_string())?;
    if mine.len() != 1 || mine[0].flow_id != "flow-mine" {
        return Err(format!("expected exactly flow-mine, got {} rows", mine.len()));
    }
    Ok(())
}
