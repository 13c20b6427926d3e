//! Canonical pipeline state
//!
//! The single versioned record combining all stage fragments plus control
//! metadata. The record is updated by replacement only: the reducer produces
//! a new value for every applied delta, and the engine is its sole writer.
//! Handlers see an immutable borrow of the current value.

use serde::{Deserialize, Serialize};

use crate::audit::AuditTrail;
use crate::config::EngineConfig;
use crate::domain::{
    ComprehensionOutput, ExecutionOutput, IterationRecord, Phase, PhaseCounts, PipelineStatus,
    PlanningOutput, StopReason, VerificationOutput, Workspace, generate_run_id,
};

/// Engine-owned control metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlBlock {
    /// Phase that runs next (or is running)
    pub current_phase: Phase,

    /// Overall disposition
    pub status: PipelineStatus,

    /// Iterations consumed so far, across all phases
    pub total_iterations: u32,

    /// Revision re-entries and failures consumed, per phase
    pub retry_counts: PhaseCounts,

    /// Global iteration ceiling
    pub max_iterations: u32,

    /// Per-phase retry budgets
    pub max_retries: PhaseCounts,

    /// Termination reason, set exactly once at a terminal state
    pub stop_reason: Option<StopReason>,
}

impl ControlBlock {
    /// Create a control block with budgets from configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current_phase: Phase::Comprehension,
            status: PipelineStatus::Running,
            total_iterations: 0,
            retry_counts: PhaseCounts::default(),
            max_iterations: config.max_iterations,
            max_retries: config.retries,
            stop_reason: None,
        }
    }

    /// Retries consumed by a phase so far
    pub fn retry_count(&self, phase: Phase) -> u32 {
        self.retry_counts.get(phase)
    }

    /// Retry budget for a phase
    pub fn retry_budget(&self, phase: Phase) -> u32 {
        self.max_retries.get(phase)
    }

    /// Whether one more retry of `phase` would exceed its budget
    pub fn would_exceed_budget(&self, phase: Phase) -> bool {
        self.retry_counts.get(phase) + 1 > self.max_retries.get(phase)
    }

    /// Consume one retry of a phase, returning the new count
    ///
    /// Callers must check [`ControlBlock::would_exceed_budget`] first; counts
    /// never exceed their budgets.
    pub fn note_retry(&mut self, phase: Phase) -> u32 {
        self.retry_counts.bump(phase)
    }

    /// Consume one global iteration
    pub fn begin_iteration(&mut self) -> u32 {
        self.total_iterations += 1;
        self.total_iterations
    }

    /// Whether the global ceiling has been reached
    pub fn iterations_exhausted(&self) -> bool {
        self.total_iterations >= self.max_iterations
    }

    /// Transition to terminal success
    pub fn complete(&mut self, reason: StopReason) {
        self.status = PipelineStatus::Complete;
        self.stop_reason = Some(reason);
    }

    /// Transition to terminal failure
    pub fn fail(&mut self, reason: StopReason) {
        self.status = PipelineStatus::Failed;
        self.stop_reason = Some(reason);
    }

    /// Check if the pipeline has terminated
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// The canonical, versioned pipeline record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Run identifier
    pub run_id: String,

    /// Bumped by every reducer application
    pub version: u64,

    /// The task as originally posed; never modified
    pub original_input: String,

    /// Comprehension fragment (None until produced)
    pub comprehension: Option<ComprehensionOutput>,

    /// Planning fragment
    pub planning: Option<PlanningOutput>,

    /// Execution fragment
    pub execution: Option<ExecutionOutput>,

    /// Verification fragment; forwarded as feedback on backtracking
    pub verification: Option<VerificationOutput>,

    /// Accumulated artifacts across execution passes
    pub workspace: Workspace,

    /// Free-form stage notes (append-only)
    pub notes: Vec<String>,

    /// Last surfaced error message
    pub error: Option<String>,

    /// Engine-owned control metadata
    pub control: ControlBlock,

    /// Append-only audit trail
    pub history: Vec<IterationRecord>,
}

impl PipelineState {
    /// Create the initial state for a task
    pub fn new(input: impl Into<String>, config: &EngineConfig) -> Self {
        let original_input = input.into();
        Self {
            run_id: generate_run_id(&original_input),
            version: 0,
            original_input,
            comprehension: None,
            planning: None,
            execution: None,
            verification: None,
            workspace: Workspace::new(),
            notes: Vec::new(),
            error: None,
            control: ControlBlock::new(config),
            history: Vec::new(),
        }
    }

    /// Version tag for audit records (e.g. "v3")
    pub fn version_tag(&self) -> String {
        format!("v{}", self.version)
    }

    /// Read-only access to the iteration history
    pub fn audit(&self) -> AuditTrail<'_> {
        AuditTrail::new(&self.history)
    }
}
