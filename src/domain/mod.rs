//! Domain types for the refinement pipeline
//!
//! Core vocabulary shared by every subsystem: phases and termination
//! reasons, stage output fragments, the task-plan graph, and audit records.

mod id;
mod outputs;
mod phase;
mod plan;
mod record;

pub use id::generate_run_id;
pub use outputs::{
    CheckStatus, ComprehensionOutput, ExecutionOutput, Issue, IssueKind, PlanningOutput,
    StructuralChecks, ToolInvocation, TraceEntry, Verdict, VerificationOutput, Workspace,
};
pub use phase::{Phase, PhaseCounts, PipelineStatus, ProblemLevel, StopReason};
pub use plan::{PlanSection, PlanValidationError, Task, TaskPlan};
pub use record::{IterationRecord, now_ms};
