//! In-memory `FlowStore` backend.
//!
//! Used by the test suites and the local server. Rows are kept under a
//! private `u64` key; `row_key` below is the single point translating the
//! business `flow_id` to that key. No other code path touches internal keys.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use wayfinder_core::{FlowRecord, TenantContext};

use crate::error::StorageError;
use crate::record::{DependentRecord, TransitionRecord};
use crate::traits::FlowStore;

#[derive(Default)]
struct Inner {
    next_key: u64,
    /// Rows by private internal key.
    rows: BTreeMap<u64, FlowRecord>,
    /// Business identifier -> internal key.
    index: BTreeMap<String, u64>,
    /// Dependent records, foreign-keyed by business flow_id.
    dependents: BTreeMap<String, Vec<DependentRecord>>,
    /// Transition audit rows, foreign-keyed by business flow_id.
    transitions: BTreeMap<String, Vec<TransitionRecord>>,
}

impl Inner {
    /// The only flow_id -> internal-key translation point.
    fn row_key(&self, flow_id: &str) -> Result<u64, StorageError> {
        self.index
            .get(flow_id)
            .copied()
            .ok_or_else(|| StorageError::NotFound {
                flow_id: flow_id.to_string(),
            })
    }
}

/// Mutex-guarded in-memory backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn insert(&self, record: FlowRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        if inner.index.contains_key(&record.flow_id) {
            return Err(StorageError::AlreadyExists {
                flow_id: record.flow_id,
            });
        }
        let key = inner.next_key;
        inner.next_key += 1;
        inner.index.insert(record.flow_id.clone(), key);
        inner.rows.insert(key, record);
        Ok(())
    }

    async fn get(&self, flow_id: &str) -> Result<FlowRecord, StorageError> {
        let inner = self.inner.lock().await;
        let key = inner.row_key(flow_id)?;
        Ok(inner.rows[&key].clone())
    }

    async fn save(
        &self,
        mut record: FlowRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let mut inner = self.inner.lock().await;
        let key = inner.row_key(&record.flow_id)?;
        let stored = match inner.rows.get_mut(&key) {
            Some(row) => row,
            None => {
                return Err(StorageError::NotFound {
                    flow_id: record.flow_id,
                })
            }
        };
        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                flow_id: record.flow_id,
                expected_version,
            });
        }
        record.version = expected_version + 1;
        let new_version = record.version;
        *stored = record;
        Ok(new_version)
    }

    async fn delete(&self, flow_id: &str, force: bool) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        let key = inner.row_key(flow_id)?;
        let dependents = inner.dependents.get(flow_id).map_or(0, Vec::len);
        if dependents > 0 && !force {
            return Err(StorageError::HasDependents {
                flow_id: flow_id.to_string(),
                dependents,
            });
        }
        inner.rows.remove(&key);
        inner.index.remove(flow_id);
        inner.dependents.remove(flow_id);
        inner.transitions.remove(flow_id);
        Ok(())
    }

    async fn list(&self, tenant: &TenantContext) -> Result<Vec<FlowRecord>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .values()
            .filter(|r| r.tenant == *tenant)
            .cloned()
            .collect())
    }

    async fn add_dependent(&self, record: DependentRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner.row_key(&record.flow_id)?;
        inner
            .dependents
            .entry(record.flow_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn count_dependents(&self, flow_id: &str) -> Result<usize, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.dependents.get(flow_id).map_or(0, Vec::len))
    }

    async fn list_dependents(
        &self,
        flow_id: &str,
    ) -> Result<Vec<DependentRecord>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.dependents.get(flow_id).cloned().unwrap_or_default())
    }

    async fn record_transition(&self, record: TransitionRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        inner
            .transitions
            .entry(record.flow_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_transitions(
        &self,
        flow_id: &str,
    ) -> Result<Vec<TransitionRecord>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.transitions.get(flow_id).cloned().unwrap_or_default())
    }
}
