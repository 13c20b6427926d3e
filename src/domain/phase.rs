//! Phase and status vocabulary for the refinement state machine

use serde::{Deserialize, Serialize};

/// A processing stage in the refinement pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Problem analysis: normalize the statement, extract givens and constraints
    Comprehension,
    /// Strategy planning: produce the task plan and workspace seed
    Planning,
    /// Plan execution: run tasks in dependency order
    Execution,
    /// Structural verification: produce the diagnostic verdict
    Verification,
}

impl Phase {
    /// All phases in forward order
    pub const ALL: [Phase; 4] = [
        Phase::Comprehension,
        Phase::Planning,
        Phase::Execution,
        Phase::Verification,
    ];

    /// The fixed forward successor (None after verification, where routing takes over)
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Comprehension => Some(Phase::Planning),
            Phase::Planning => Some(Phase::Execution),
            Phase::Execution => Some(Phase::Verification),
            Phase::Verification => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Comprehension => write!(f, "comprehension"),
            Self::Planning => write!(f, "planning"),
            Self::Execution => write!(f, "execution"),
            Self::Verification => write!(f, "verification"),
        }
    }
}

/// Overall pipeline disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// A stage is active or about to be dispatched
    #[default]
    Running,
    /// Terminal success
    Complete,
    /// Terminal failure
    Failed,
}

impl PipelineStatus {
    /// Check if the pipeline has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Root-cause phase named by a diagnostic, used as the backtracking target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemLevel {
    /// The problem statement was misread (rare)
    Comprehension,
    /// The plan or its strategy drifted (most common)
    Planning,
    /// Arithmetic or formatting slipped inside an otherwise-correct plan
    Execution,
}

impl From<ProblemLevel> for Phase {
    fn from(level: ProblemLevel) -> Self {
        match level {
            ProblemLevel::Comprehension => Phase::Comprehension,
            ProblemLevel::Planning => Phase::Planning,
            ProblemLevel::Execution => Phase::Execution,
        }
    }
}

/// Machine-readable termination reason, set exactly once at a terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Verification passed
    Solved,
    /// Verification passed with soft warnings (terminal success)
    SolvedWithWarnings,
    /// A phase exhausted its retry budget
    RetryBudgetExceeded { phase: Phase, budget: u32 },
    /// Verification reported an unrecoverable error
    FatalVerification,
    /// The global iteration ceiling was hit
    IterationBudgetExceeded { max_iterations: u32 },
    /// The run was cancelled at a phase boundary
    Cancelled,
}

impl StopReason {
    /// Check if the reason denotes a successful run
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Solved | Self::SolvedWithWarnings)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solved => write!(f, "solved"),
            Self::SolvedWithWarnings => write!(f, "solved with warnings"),
            Self::RetryBudgetExceeded { phase, budget } => {
                write!(f, "{phase} exceeded max retries ({budget})")
            }
            Self::FatalVerification => write!(f, "fatal verification error"),
            Self::IterationBudgetExceeded { .. } => write!(f, "max iterations exceeded"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-phase counters, used for both retry counts and retry budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PhaseCounts {
    pub comprehension: u32,
    pub planning: u32,
    pub execution: u32,
    pub verification: u32,
}

impl PhaseCounts {
    /// Same value for every phase
    pub fn uniform(value: u32) -> Self {
        Self {
            comprehension: value,
            planning: value,
            execution: value,
            verification: value,
        }
    }

    /// Get the counter for a phase
    pub fn get(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Comprehension => self.comprehension,
            Phase::Planning => self.planning,
            Phase::Execution => self.execution,
            Phase::Verification => self.verification,
        }
    }

    /// Increment the counter for a phase, returning the new value
    pub fn bump(&mut self, phase: Phase) -> u32 {
        let slot = match phase {
            Phase::Comprehension => &mut self.comprehension,
            Phase::Planning => &mut self.planning,
            Phase::Execution => &mut self.execution,
            Phase::Verification => &mut self.verification,
        };
        *slot += 1;
        *slot
    }
}
