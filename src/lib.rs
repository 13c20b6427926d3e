//! Stagewise - verification-gated staged refinement engine
//!
//! Stagewise drives a task through four pluggable stages (comprehension,
//! planning, execution, verification). A structured diagnostic from the
//! verification stage can send the task back to an earlier stage for
//! correction, bounded by per-phase retry budgets and a global iteration
//! ceiling, until the task either succeeds or exhausts its budget.
//!
//! # Core Concepts
//!
//! - **Replacement-only state**: [`PipelineState`] is a versioned value; every
//!   applied delta produces a new version, and the engine is the sole writer
//! - **Declared merge modes**: each state field merges by append, key union,
//!   or tagged override - chosen statically, never sniffed from the payload
//! - **Deterministic routing**: any advisory component may produce the
//!   diagnostic; the pure router alone decides the next transition
//! - **Budgeted backtracking**: handler failures, timeouts, and rejected
//!   plans consume retries instead of crashing the pipeline
//!
//! # Modules
//!
//! - [`domain`] - phases, stage outputs, task plans, audit records
//! - [`state`] - the canonical state record and its reducers
//! - [`handler`] - the pluggable stage handler contract
//! - [`engine`] - pipeline driver, plan executor, verdict router
//! - [`config`] - configuration types and loading
//! - [`audit`] - read-only iteration history access
//! - [`logging`] - opt-in dev tracing setup

pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod handler;
pub mod logging;
pub mod state;

// Re-export commonly used types
pub use audit::AuditTrail;
pub use config::{EngineConfig, HandlerTimeouts};
pub use domain::{
    CheckStatus, ComprehensionOutput, ExecutionOutput, Issue, IssueKind, IterationRecord, Phase,
    PhaseCounts, PipelineStatus, PlanSection, PlanValidationError, PlanningOutput, ProblemLevel,
    StopReason, StructuralChecks, Task, TaskPlan, ToolInvocation, TraceEntry, Verdict,
    VerificationOutput, Workspace,
};
pub use engine::{
    CancelHandle, EngineError, PipelineEngine, PipelineOutcome, PlanExecutionHandler, PlanExecutor,
    ToolRunner, Transition, route,
};
pub use handler::{HandlerRegistry, HandlerResponse, StageHandler};
pub use state::{ControlBlock, Overwrite, PipelineState, StateDelta, reduce};
