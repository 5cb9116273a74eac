//! Wayfinder domain model -- flow records, phase sequences, gate results,
//! and the error taxonomy shared by the engine, storage, and serving layers.
//!
//! A *flow* is one instance of a multi-phase migration sub-process
//! (Discovery, Collection, or Assessment) for a tenant engagement. Flows
//! advance through a fixed linear phase sequence; each phase completion is
//! guarded by a *gate* predicate. This crate holds only the data model and
//! the pure parts; lifecycle transitions live in `wayfinder-engine`.

pub mod error;
pub mod flow;
pub mod gate;
pub mod input;
pub mod phase_data;
pub mod tenant;

pub use error::FlowError;
pub use flow::{FlowRecord, FlowStatus, FlowType, Phase, PhaseState};
pub use gate::{GateKind, GateResult, MissingItem};
pub use input::{ImportRecord, PhaseInput, QuestionnaireResponse};
pub use phase_data::{
    Gap, GapPriority, PhaseOutput, QuestionnaireRef, SixR, StrategyCall,
};
pub use tenant::TenantContext;

/// Format an `OffsetDateTime` as the RFC 3339 string stored in records.
pub fn rfc3339_now() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
