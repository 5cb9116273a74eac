//! Wayfinder flow engine: validation gates, phase executors, the analysis
//! provider seam, and the lifecycle controller that owns every flow
//! transition.
//!
//! The controller is the only writer of `status` and `current_phase`.
//! Everything else in this crate is a pure or side-effect-free collaborator
//! it dispatches to.

pub mod analysis;
pub mod controller;
pub mod executor;
pub mod gates;
pub mod retry;

pub use analysis::{AnalysisError, AnalysisProvider, HeuristicProvider};
pub use controller::{AdvanceOutcome, LifecycleController};
pub use executor::{executor_for, ExecutorContext, ExecutorOutcome, PhaseExecutor};
pub use retry::RetryPolicy;
