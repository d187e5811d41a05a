//! Response pipeline for Sage.
//!
//! [`PipelineOrchestrator`] takes a [`PipelineRequest`] through the states
//! checked by [`state_machine::validate_transition`] and returns a
//! [`PipelineResult`] carrying either the answer or an apology, plus any
//! degraded-step warnings.

pub mod apology;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod state_machine;
pub mod types;

pub use apology::{apology_for, GENERIC_APOLOGY};
pub use context::{AssembledContext, ContextAssembler};
pub use error::PipelineError;
pub use orchestrator::PipelineOrchestrator;
pub use types::{
    PipelineInput, PipelineRequest, PipelineResult, PipelineStage, PipelineState, StageFailure,
    StageWarning,
};
