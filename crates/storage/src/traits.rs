use async_trait::async_trait;
use wayfinder_core::{FlowRecord, TenantContext};

use crate::error::StorageError;
use crate::record::{DependentRecord, TransitionRecord};

/// The storage trait for Wayfinder flow backends.
///
/// A `FlowStore` provides durable storage for flow records, their dependent
/// records (questionnaire responses), and the transition audit log.
///
/// ## Identifier discipline
///
/// Every method is keyed by the durable business `flow_id`. A backend may
/// keep a private internal row key, but it must stay strictly inside the
/// implementation: it never appears in returned records, dependent foreign
/// keys, or lookups driven by external identifiers.
///
/// ## OCC Conflict Detection
///
/// `save` performs an optimistic concurrency check: the write is conditional
/// on `version = expected_version`. If the stored version differs, the
/// method returns `Err(StorageError::VersionConflict { ... })` and the
/// caller must re-fetch and re-evaluate before retrying. This is the
/// mechanism serializing transitions per flow; cross-flow operations are
/// fully independent.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait FlowStore: Send + Sync + 'static {
    // ── Flow records ─────────────────────────────────────────────────────────

    /// Insert a new flow record at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the flow_id is taken.
    async fn insert(&self, record: FlowRecord) -> Result<(), StorageError>;

    /// Read the latest committed record for a flow.
    ///
    /// Returns `Err(StorageError::NotFound)` if the flow does not exist.
    async fn get(&self, flow_id: &str) -> Result<FlowRecord, StorageError>;

    /// Apply a version-validated write (OCC).
    ///
    /// Conditional on `version = expected_version`; on conflict returns
    /// `Err(StorageError::VersionConflict)`. On success the stored record
    /// carries `expected_version + 1`, which is also returned.
    async fn save(
        &self,
        record: FlowRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    /// Delete a flow.
    ///
    /// With `force = false`, fails with `Err(StorageError::HasDependents)`
    /// when dependent records exist, deleting nothing. With `force = true`,
    /// cascades to dependents and transitions.
    async fn delete(&self, flow_id: &str, force: bool) -> Result<(), StorageError>;

    /// List all flows owned by a tenant.
    async fn list(&self, tenant: &TenantContext) -> Result<Vec<FlowRecord>, StorageError>;

    // ── Dependent records ────────────────────────────────────────────────────

    /// Append a dependent record. The parent flow must exist.
    async fn add_dependent(&self, record: DependentRecord) -> Result<(), StorageError>;

    /// Count dependent records for a flow (0 for a missing flow).
    async fn count_dependents(&self, flow_id: &str) -> Result<usize, StorageError>;

    /// List dependent records for a flow.
    async fn list_dependents(
        &self,
        flow_id: &str,
    ) -> Result<Vec<DependentRecord>, StorageError>;

    // ── Transition audit log ─────────────────────────────────────────────────

    /// Append a transition audit row.
    async fn record_transition(&self, record: TransitionRecord) -> Result<(), StorageError>;

    /// List transition audit rows for a flow, in commit order.
    async fn list_transitions(
        &self,
        flow_id: &str,
    ) -> Result<Vec<TransitionRecord>, StorageError>;
}
