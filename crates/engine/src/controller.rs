//! The flow lifecycle controller.
//!
//! Owns every transition of `status` and `current_phase`. All mutation goes
//! through one write path: read the freshest committed record, compute the
//! transition, and commit it with a version-validated save. A conflicted
//! commit is never retried against stale state; the controller re-fetches
//! and re-evaluates, so at most one transition succeeds per gate evaluation
//! even under concurrent `advance` calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use wayfinder_core::{
    FlowError, FlowRecord, FlowStatus, FlowType, GateKind, MissingItem, Phase, PhaseInput,
    PhaseOutput, PhaseState, TenantContext,
};
use wayfinder_storage::{DependentRecord, FlowStore, TransitionRecord};

use crate::analysis::AnalysisProvider;
use crate::executor::{accepts_input, executor_for, ExecutorContext, ExecutorOutcome};
use crate::gates;
use crate::retry::RetryPolicy;

/// Bound on commit attempts within one controller call. Each attempt
/// re-evaluates against freshly fetched state.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// The phase that consumes the supplied input kind: the current phase when
/// it accepts the kind, otherwise the nearest earlier phase of the sequence
/// that does. `None` when no phase at or before the current one takes it.
fn accepting_phase(record: &FlowRecord, input: &PhaseInput) -> Option<Phase> {
    if accepts_input(record.current_phase, input) {
        return Some(record.current_phase);
    }
    record
        .flow_type
        .phases()
        .iter()
        .copied()
        .take_while(|p| *p != record.current_phase)
        .find(|p| accepts_input(*p, input))
}

/// Outcome of one `advance` call, returned as structured data.
///
/// `Paused` is the expected, user-resolvable case and is deliberately not an
/// error; its `missing` list always names the concrete blockers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The gate passed; the flow moved to this phase.
    Advanced { phase: Phase },
    /// The final gate passed; the flow is complete.
    Completed,
    /// The gate failed; the flow is paused with the enumerated blockers.
    Paused {
        gate: GateKind,
        missing: Vec<MissingItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
        awaiting_input: bool,
    },
    /// A concurrent call already advanced this flow; this call was a no-op.
    AlreadyAdvanced {
        current_phase: Phase,
        status: FlowStatus,
    },
    /// The next phase's executor failed fatally; the flow is now `failed`.
    Failed { phase: Phase, error: String },
}

/// Result of one commit attempt inside `advance`.
enum Attempt {
    Committed(AdvanceOutcome),
    /// OCC conflict; caller re-fetches and re-evaluates.
    Conflict,
}

/// Resolved executor outcome after the retry policy has been applied.
enum Resolved {
    Output(PhaseOutput),
    NeedsInput,
    Fatal(String),
}

/// The authoritative owner of flow transitions.
pub struct LifecycleController<S: FlowStore> {
    store: Arc<S>,
    analysis: Arc<dyn AnalysisProvider>,
    retry: RetryPolicy,
}

impl<S: FlowStore> LifecycleController<S> {
    pub fn new(store: Arc<S>, analysis: Arc<dyn AnalysisProvider>) -> Self {
        LifecycleController {
            store,
            analysis,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create a new flow at the first phase of its sequence.
    pub async fn initialize(
        &self,
        flow_type: FlowType,
        tenant: TenantContext,
    ) -> Result<FlowRecord, FlowError> {
        tenant.validate()?;
        let flow_id = format!("flow-{}", Uuid::new_v4());
        let record = FlowRecord::new(flow_id, flow_type, tenant);
        self.store.insert(record.clone()).await?;
        tracing::info!(
            flow_id = %record.flow_id,
            flow_type = %record.flow_type,
            "flow initialized"
        );
        Ok(record)
    }

    /// Latest committed snapshot of a flow.
    pub async fn get_status(
        &self,
        flow_id: &str,
        tenant: &TenantContext,
    ) -> Result<FlowRecord, FlowError> {
        tenant.validate()?;
        let record = self.store.get(flow_id).await?;
        tenant.check_matches(&record.tenant)?;
        Ok(record)
    }

    /// All flows owned by a tenant.
    pub async fn list(&self, tenant: &TenantContext) -> Result<Vec<FlowRecord>, FlowError> {
        tenant.validate()?;
        Ok(self.store.list(tenant).await?)
    }

    /// Committed transition audit rows for a flow.
    pub async fn transitions(
        &self,
        flow_id: &str,
        tenant: &TenantContext,
    ) -> Result<Vec<TransitionRecord>, FlowError> {
        self.get_status(flow_id, tenant).await?;
        Ok(self.store.list_transitions(flow_id).await?)
    }

    /// Attempt one phase transition: evaluate the current gate and, if it
    /// passes, execute the next phase.
    pub async fn advance(
        &self,
        flow_id: &str,
        tenant: &TenantContext,
    ) -> Result<AdvanceOutcome, FlowError> {
        tenant.validate()?;
        let mut commit_attempts = 0;
        loop {
            let record = self.store.get(flow_id).await?;
            tenant.check_matches(&record.tenant)?;
            if record.status.is_terminal() {
                return Err(FlowError::InvalidState {
                    flow_id: record.flow_id,
                    status: record.status,
                });
            }
            let started_phase = record.current_phase;
            match self.try_advance(record).await? {
                Attempt::Committed(outcome) => {
                    tracing::info!(flow_id, ?outcome, "advance committed");
                    return Ok(outcome);
                }
                Attempt::Conflict => {
                    commit_attempts += 1;
                    tracing::warn!(flow_id, commit_attempts, "advance hit a version conflict");
                    // Never commit against a stale read: look at the freshest
                    // state before deciding anything.
                    let fresh = self.store.get(flow_id).await?;
                    tenant.check_matches(&fresh.tenant)?;
                    if fresh.current_phase != started_phase || fresh.status.is_terminal() {
                        return Ok(AdvanceOutcome::AlreadyAdvanced {
                            current_phase: fresh.current_phase,
                            status: fresh.status,
                        });
                    }
                    if commit_attempts >= MAX_COMMIT_ATTEMPTS {
                        return Err(FlowError::VersionConflict {
                            flow_id: flow_id.to_string(),
                            expected_version: fresh.version,
                        });
                    }
                }
            }
        }
    }

    /// Supply externally produced input to a flow.
    ///
    /// Routes the payload to the nearest phase of the sequence (current or
    /// earlier) whose executor consumes this input kind, then re-derives the
    /// outputs of the phases between there and the current one, so a
    /// corrective import batch can unblock a flow paused on a downstream
    /// gate. Questionnaire responses are additionally recorded as dependent
    /// records of the flow.
    pub async fn supply_input(
        &self,
        flow_id: &str,
        tenant: &TenantContext,
        input: PhaseInput,
    ) -> Result<FlowRecord, FlowError> {
        tenant.validate()?;
        let mut commit_attempts = 0;
        loop {
            let mut record = self.store.get(flow_id).await?;
            tenant.check_matches(&record.tenant)?;
            if record.status.is_terminal() {
                return Err(FlowError::InvalidState {
                    flow_id: record.flow_id,
                    status: record.status,
                });
            }
            let phase = record.current_phase;
            let target = match accepting_phase(&record, &input) {
                Some(target) => target,
                None => {
                    return Err(FlowError::InputNotAccepted {
                        phase,
                        kind: input.kind().to_string(),
                    });
                }
            };
            let output = match self
                .run_executor(target, &record.phase_data, Some(&input))
                .await
            {
                Resolved::Output(output) => output,
                Resolved::NeedsInput => {
                    return Err(FlowError::InputNotAccepted {
                        phase: target,
                        kind: input.kind().to_string(),
                    });
                }
                // Bad input is the caller's error; it does not fail the flow.
                Resolved::Fatal(message) => {
                    return Err(FlowError::ExecutorFailed {
                        phase: target,
                        message,
                    });
                }
            };
            let expected = record.version;
            record.phase_data.insert(target, output);
            if target != phase {
                self.refresh_derived_outputs(&mut record, target).await?;
            }
            record.updated_at = wayfinder_core::rfc3339_now();
            match self.store.save(record.clone(), expected).await {
                Ok(version) => {
                    record.version = version;
                    self.record_dependents(&record.flow_id, &input).await?;
                    tracing::info!(flow_id, phase = %target, "input applied");
                    return Ok(record);
                }
                Err(wayfinder_storage::StorageError::VersionConflict { .. }) => {
                    commit_attempts += 1;
                    if commit_attempts >= MAX_COMMIT_ATTEMPTS {
                        return Err(FlowError::VersionConflict {
                            flow_id: flow_id.to_string(),
                            expected_version: expected,
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// User-initiated terminal state, reachable from any non-terminal state.
    pub async fn cancel(
        &self,
        flow_id: &str,
        tenant: &TenantContext,
    ) -> Result<FlowRecord, FlowError> {
        tenant.validate()?;
        let mut commit_attempts = 0;
        loop {
            let mut record = self.store.get(flow_id).await?;
            tenant.check_matches(&record.tenant)?;
            if record.status.is_terminal() {
                return Err(FlowError::InvalidState {
                    flow_id: record.flow_id,
                    status: record.status,
                });
            }
            let expected = record.version;
            let from_status = record.status;
            record.status = FlowStatus::Cancelled;
            record.phase_state = None;
            record.updated_at = wayfinder_core::rfc3339_now();
            match self.store.save(record.clone(), expected).await {
                Ok(version) => {
                    record.version = version;
                    self.audit(&record, from_status, record.current_phase, expected)
                        .await?;
                    tracing::info!(flow_id, "flow cancelled");
                    return Ok(record);
                }
                Err(wayfinder_storage::StorageError::VersionConflict { .. }) => {
                    commit_attempts += 1;
                    if commit_attempts >= MAX_COMMIT_ATTEMPTS {
                        return Err(FlowError::VersionConflict {
                            flow_id: flow_id.to_string(),
                            expected_version: expected,
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a flow and, with `force`, its dependent records.
    pub async fn delete(
        &self,
        flow_id: &str,
        tenant: &TenantContext,
        force: bool,
    ) -> Result<(), FlowError> {
        tenant.validate()?;
        let record = self.store.get(flow_id).await?;
        tenant.check_matches(&record.tenant)?;
        self.store.delete(flow_id, force).await?;
        tracing::info!(flow_id, force, "flow deleted");
        Ok(())
    }

    // ── Transition computation ───────────────────────────────────────────────

    async fn try_advance(&self, mut record: FlowRecord) -> Result<Attempt, FlowError> {
        let expected = record.version;
        let phase = record.current_phase;
        let from_status = record.status;

        // First phases have no upstream transition to produce their output;
        // compute it here when the executor can run without input.
        if record.output(phase).is_none() {
            match self.run_executor(phase, &record.phase_data, None).await {
                Resolved::Output(output) => {
                    record.phase_data.insert(phase, output);
                }
                Resolved::NeedsInput => {}
                Resolved::Fatal(message) => {
                    return self.commit_failed(record, expected, phase, message).await;
                }
            }
        }

        let gate = gates::evaluate(phase, &record.phase_data);
        if !gate.passed {
            let kind = GateKind::for_phase(phase);
            record.status = FlowStatus::Paused;
            record.phase_state = Some(PhaseState::gate_pending(
                kind,
                gate.missing.clone(),
                gate.score,
            ));
            record.updated_at = wayfinder_core::rfc3339_now();
            let outcome = AdvanceOutcome::Paused {
                gate: kind,
                missing: gate.missing,
                score: gate.score,
                awaiting_input: kind.awaits_input(),
            };
            return self
                .commit(record, expected, from_status, phase, outcome)
                .await;
        }

        let next = match record.next_phase() {
            Some(next) => next,
            None => {
                record.phase_completion.insert(phase, true);
                record.status = FlowStatus::Completed;
                record.phase_state = None;
                record.updated_at = wayfinder_core::rfc3339_now();
                return self
                    .commit(record, expected, from_status, phase, AdvanceOutcome::Completed)
                    .await;
            }
        };
        match self.run_executor(next, &record.phase_data, None).await {
            Resolved::Output(output) => {
                record.phase_data.insert(next, output);
            }
            Resolved::NeedsInput => {}
            Resolved::Fatal(message) => {
                return self.commit_failed(record, expected, next, message).await;
            }
        }
        record.phase_completion.insert(phase, true);
        record.current_phase = next;
        record.status = FlowStatus::Running;
        record.phase_state = None;
        record.updated_at = wayfinder_core::rfc3339_now();
        self.commit(
            record,
            expected,
            from_status,
            phase,
            AdvanceOutcome::Advanced { phase: next },
        )
        .await
    }

    async fn commit_failed(
        &self,
        mut record: FlowRecord,
        expected: i64,
        phase: Phase,
        message: String,
    ) -> Result<Attempt, FlowError> {
        let from_status = record.status;
        let from_phase = record.current_phase;
        record.status = FlowStatus::Failed;
        record.phase_state = Some(PhaseState::executor_failed(message.clone()));
        record.updated_at = wayfinder_core::rfc3339_now();
        tracing::error!(flow_id = %record.flow_id, phase = %phase, %message, "executor failed");
        self.commit(
            record,
            expected,
            from_status,
            from_phase,
            AdvanceOutcome::Failed {
                phase,
                error: message,
            },
        )
        .await
    }

    /// Version-validated save plus the audit row. On conflict nothing is
    /// written and the caller re-evaluates from fresh state.
    async fn commit(
        &self,
        mut record: FlowRecord,
        expected: i64,
        from_status: FlowStatus,
        from_phase: Phase,
        outcome: AdvanceOutcome,
    ) -> Result<Attempt, FlowError> {
        match self.store.save(record.clone(), expected).await {
            Ok(version) => {
                record.version = version;
                if record.status != from_status || record.current_phase != from_phase {
                    self.audit(&record, from_status, from_phase, expected).await?;
                }
                Ok(Attempt::Committed(outcome))
            }
            Err(wayfinder_storage::StorageError::VersionConflict { .. }) => Ok(Attempt::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    async fn audit(
        &self,
        record: &FlowRecord,
        from_status: FlowStatus,
        from_phase: Phase,
        from_version: i64,
    ) -> Result<(), FlowError> {
        self.store
            .record_transition(TransitionRecord {
                id: format!("txn-{}", Uuid::new_v4()),
                flow_id: record.flow_id.clone(),
                from_status,
                to_status: record.status,
                from_phase,
                to_phase: record.current_phase,
                from_version,
                to_version: record.version,
                at: wayfinder_core::rfc3339_now(),
            })
            .await?;
        Ok(())
    }

    /// Re-run the executors between `target` and the current phase so their
    /// stored outputs reflect the freshly updated upstream slot. Input
    /// phases are left alone; their outputs only change through new input.
    async fn refresh_derived_outputs(
        &self,
        record: &mut FlowRecord,
        target: Phase,
    ) -> Result<(), FlowError> {
        let downstream: Vec<Phase> = record
            .flow_type
            .phases()
            .iter()
            .copied()
            .skip_while(|p| *p != target)
            .skip(1)
            .collect();
        for phase in downstream {
            match self.run_executor(phase, &record.phase_data, None).await {
                Resolved::Output(output) => {
                    record.phase_data.insert(phase, output);
                }
                Resolved::NeedsInput => {}
                Resolved::Fatal(message) => {
                    return Err(FlowError::ExecutorFailed { phase, message });
                }
            }
            if phase == record.current_phase {
                break;
            }
        }
        Ok(())
    }

    async fn record_dependents(
        &self,
        flow_id: &str,
        input: &PhaseInput,
    ) -> Result<(), FlowError> {
        if let PhaseInput::QuestionnaireResponses { responses } = input {
            for response in responses {
                self.store
                    .add_dependent(DependentRecord {
                        id: format!("resp-{}", Uuid::new_v4()),
                        flow_id: flow_id.to_string(),
                        questionnaire_id: response.questionnaire_id.clone(),
                        respondent: response.respondent.clone(),
                        recorded_at: wayfinder_core::rfc3339_now(),
                    })
                    .await?;
            }
        }
        Ok(())
    }

    // ── Executor invocation with bounded retry ───────────────────────────────

    async fn run_executor(
        &self,
        phase: Phase,
        phase_data: &BTreeMap<Phase, PhaseOutput>,
        input: Option<&PhaseInput>,
    ) -> Resolved {
        let executor = executor_for(phase);
        let mut attempt = 1;
        loop {
            let outcome = executor
                .run(ExecutorContext {
                    phase_data,
                    input,
                    analysis: self.analysis.as_ref(),
                })
                .await;
            match outcome {
                ExecutorOutcome::Success(output) => return Resolved::Output(output),
                ExecutorOutcome::NeedsInput => return Resolved::NeedsInput,
                ExecutorOutcome::Fatal(message) => return Resolved::Fatal(message),
                ExecutorOutcome::Retryable(message) => {
                    if attempt >= self.retry.max_attempts {
                        return Resolved::Fatal(format!(
                            "retries exhausted after {attempt} attempt(s): {message}"
                        ));
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        phase = %phase,
                        attempt,
                        %message,
                        "retryable executor failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
