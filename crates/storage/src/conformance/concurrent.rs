use std::future::Future;
use std::sync::Arc;

use wayfinder_core::FlowStatus;

use super::{make_record, TestResult};
use crate::{FlowStore, StorageError};

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_saves_have_exactly_one_winner",
        concurrent_saves_have_exactly_one_winner(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "delete_racing_save_is_recoverable",
        delete_racing_save_is_recoverable(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Many writers racing on the same expected version: exactly one save
/// succeeds, everyone else observes VersionConflict.
async fn concurrent_saves_have_exactly_one_winner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    s.insert(make_record("flow-race"))
        .await
        .map_err(|e| e.to_string())?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&s);
        handles.push(tokio::spawn(async move {
            let mut rec = store.get("flow-race").await?;
            rec.status = FlowStatus::Running;
            store.save(rec, 0).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.map_err(|e| e.to_string())? {
            Ok(_) => wins += 1,
            Err(StorageError::VersionConflict { .. }) => conflicts += 1,
            Err(e) => return Err(format!("unexpected error: {e}")),
        }
    }
    if wins != 1 {
        return Err(format!("expected exactly 1 winner, got {wins}"));
    }
    if conflicts != 7 {
        return Err(format!("expected 7 conflicts, got {conflicts}"));
    }
    let stored = s.get("flow-race").await.map_err(|e| e.to_string())?;
    if stored.version != 1 {
        return Err(format!("expected version 1 after race, got {}", stored.version));
    }
    Ok(())
}

/// A delete racing in-flight saves must surface only NotFound or
/// VersionConflict to the writers -- never corruption or a crash.
async fn delete_racing_save_is_recoverable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FlowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = Arc::new(factory().await);
    s.insert(make_record("flow-race-del"))
        .await
        .map_err(|e| e.to_string())?;

    let writer = {
        let store = Arc::clone(&s);
        tokio::spawn(async move {
            for _ in 0..20 {
                let rec = match store.get("flow-race-del").await {
                    Ok(r) => r,
                    Err(StorageError::NotFound { .. }) => return Ok(()),
                    Err(e) => return Err(e.to_string()),
                };
                match store.save(rec.clone(), rec.version).await {
                    Ok(_) => {}
                    Err(StorageError::NotFound { .. })
                    | Err(StorageError::VersionConflict { .. }) => {}
                    Err(e) => return Err(e.to_string()),
                }
                tokio::task::yield_now().await;
            }
            Ok(())
        })
    };

    let deleter = {
        let store = Arc::clone(&s);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            match store.delete("flow-race-del", true).await {
                Ok(()) | Err(StorageError::NotFound { .. }) => Ok(()),
                Err(e) => Err(e.to_string()),
            }
        })
    };

    writer.await.map_err(|e| e.to_string())??;
    deleter.await.map_err(|e| e.to_string())??;
    Ok(())
}
