//! Structured stage outputs
//!
//! One fragment type per pipeline phase, plus the diagnostic vocabulary the
//! router consumes. Fragments are produced by handlers and merged into the
//! canonical state by the reducer; the engine never inspects their prose,
//! only their structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::phase::ProblemLevel;
use super::plan::TaskPlan;

/// Key-value map of computed artifacts, keyed by task `output_id`
pub type Workspace = BTreeMap<String, Value>;

/// Output of the Comprehension phase: the normalized problem and what was
/// extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComprehensionOutput {
    /// Normalized problem statement
    pub normalized_problem: String,

    /// Known facts extracted from the statement
    #[serde(default)]
    pub givens: Vec<String>,

    /// What must be produced
    #[serde(default)]
    pub objectives: Vec<String>,

    /// Explicit constraints the result must respect
    #[serde(default)]
    pub constraints: Vec<String>,

    /// Identified problem domain
    #[serde(default)]
    pub domain: String,

    /// Derived strategy notes for the planner
    #[serde(default)]
    pub strategy_notes: Vec<String>,
}

/// Output of the Planning phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlanningOutput {
    /// Initial workspace variables the plan assumes
    #[serde(default)]
    pub workspace_seed: Workspace,

    /// The task plan, validated by the engine before execution
    pub plan: TaskPlan,
}

/// One tool call made while executing a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Task this invocation belongs to
    pub task_id: String,

    /// Tool identifier chosen by the tool-selection capability
    pub tool: String,

    /// Input handed to the tool
    pub input: String,

    /// What the tool produced
    pub output: Value,

    /// Why this tool was chosen
    pub rationale: String,
}

/// One entry in the execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEntry {
    /// A task ran and produced output
    Invocation(ToolInvocation),

    /// A task ran and failed
    TaskFailed { task_id: String, error: String },

    /// A task was skipped because an upstream dependency failed
    BlockedSkipped {
        task_id: String,
        failed_dependency: String,
    },
}

impl TraceEntry {
    /// The task this entry describes
    pub fn task_id(&self) -> &str {
        match self {
            Self::Invocation(inv) => &inv.task_id,
            Self::TaskFailed { task_id, .. } => task_id,
            Self::BlockedSkipped { task_id, .. } => task_id,
        }
    }
}

/// Output of the Execution phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionOutput {
    /// Artifacts computed so far, keyed by `output_id`
    pub workspace: Workspace,

    /// Ordered trace of tool invocations, failures, and skips
    pub trace: Vec<TraceEntry>,

    /// The final deliverable value, when the plan produced one
    pub final_result: Option<Value>,
}

impl ExecutionOutput {
    /// Count of tasks that completed successfully
    pub fn completed_count(&self) -> usize {
        self.trace
            .iter()
            .filter(|e| matches!(e, TraceEntry::Invocation(_)))
            .count()
    }

    /// Check whether every task in the trace completed
    pub fn fully_completed(&self) -> bool {
        self.trace
            .iter()
            .all(|e| matches!(e, TraceEntry::Invocation(_)))
    }
}

/// Verdict of the verification diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// All structural checks passed
    Passed,
    /// No check failed but at least one raised a soft warning
    PassedWithWarnings,
    /// At least one check failed; a problem level names the backtracking target
    NeedsRevision,
    /// Verification found an unrecoverable condition
    FatalError,
}

impl Verdict {
    /// Check if the verdict terminates the pipeline successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed | Self::PassedWithWarnings)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::PassedWithWarnings => write!(f, "passed with warnings"),
            Self::NeedsRevision => write!(f, "needs revision"),
            Self::FatalError => write!(f, "fatal error"),
        }
    }
}

/// Classification of a diagnostic finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FactualError,
    LogicalFlaw,
    Incompleteness,
    CalculationError,
    FormatError,
    MissingStep,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FactualError => write!(f, "factual error"),
            Self::LogicalFlaw => write!(f, "logical flaw"),
            Self::Incompleteness => write!(f, "incompleteness"),
            Self::CalculationError => write!(f, "calculation error"),
            Self::FormatError => write!(f, "format error"),
            Self::MissingStep => write!(f, "missing step"),
        }
    }
}

/// A single finding from the verification diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub detail: String,

    /// Where the problem was found (task id, step number)
    #[serde(default)]
    pub location: Option<String>,
}

impl Issue {
    /// Create an issue without a location
    pub fn new(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            location: None,
        }
    }

    /// Builder: set the location
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// One-line rendering for audit summaries
    pub fn summary(&self) -> String {
        match &self.location {
            Some(loc) => format!("[{}] {} (at {})", self.kind, self.detail, loc),
            None => format!("[{}] {}", self.kind, self.detail),
        }
    }
}

/// Result of one structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

/// The four structural checks the diagnostic runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralChecks {
    /// Does execution match the plan's intent
    pub consistency: CheckStatus,

    /// Are task input/output references correctly threaded
    pub logical_chain: CheckStatus,

    /// Does the result respect all extracted constraints
    pub constraints: CheckStatus,

    /// Is the final result complete
    pub completeness: CheckStatus,
}

impl StructuralChecks {
    /// All four checks passed
    pub fn all_passed() -> Self {
        Self {
            consistency: CheckStatus::Passed,
            logical_chain: CheckStatus::Passed,
            constraints: CheckStatus::Passed,
            completeness: CheckStatus::Passed,
        }
    }

    fn statuses(&self) -> [CheckStatus; 4] {
        [
            self.consistency,
            self.logical_chain,
            self.constraints,
            self.completeness,
        ]
    }

    /// Derive the verdict: any failure needs revision, otherwise a warning
    /// downgrades a pass to passed-with-warnings
    pub fn verdict(&self) -> Verdict {
        let statuses = self.statuses();
        if statuses.iter().any(|s| *s == CheckStatus::Failed) {
            Verdict::NeedsRevision
        } else if statuses.iter().any(|s| *s == CheckStatus::Warning) {
            Verdict::PassedWithWarnings
        } else {
            Verdict::Passed
        }
    }
}

/// The structured diagnostic produced by the Verification phase
///
/// The router consumes this verbatim; everything the diagnostician wants the
/// engine to act on must be expressed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutput {
    pub verdict: Verdict,

    /// Findings, most significant first
    #[serde(default)]
    pub issues: Vec<Issue>,

    /// Actionable revision suggestions forwarded to the re-entered stage
    #[serde(default)]
    pub suggestions: Vec<String>,

    /// Root-cause phase; required for meaningful revision routing
    #[serde(default)]
    pub problem_level: Option<ProblemLevel>,

    /// Why the verdict was reached
    pub rationale: String,

    /// Diagnostician confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
}

impl VerificationOutput {
    /// A passing diagnostic
    pub fn passed(rationale: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Passed,
            issues: Vec::new(),
            suggestions: Vec::new(),
            problem_level: None,
            rationale: rationale.into(),
            confidence: 1.0,
        }
    }

    /// A revision request targeting the given phase
    pub fn needs_revision(level: ProblemLevel, rationale: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::NeedsRevision,
            issues: Vec::new(),
            suggestions: Vec::new(),
            problem_level: Some(level),
            rationale: rationale.into(),
            confidence: 1.0,
        }
    }

    /// An unrecoverable diagnostic
    pub fn fatal(rationale: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::FatalError,
            issues: Vec::new(),
            suggestions: Vec::new(),
            problem_level: None,
            rationale: rationale.into(),
            confidence: 1.0,
        }
    }

    /// Build a diagnostic from the four structural checks
    pub fn from_checks(
        checks: StructuralChecks,
        problem_level: Option<ProblemLevel>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            verdict: checks.verdict(),
            issues: Vec::new(),
            suggestions: Vec::new(),
            problem_level,
            rationale: rationale.into(),
            confidence: 1.0,
        }
    }

    /// Builder: add a finding
    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    /// Builder: add a revision suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Builder: set the confidence score, clamped to [0, 1]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// One-line summaries of all findings, for the audit trail
    pub fn issues_summary(&self) -> Vec<String> {
        self.issues.iter().map(Issue::summary).collect()
    }
}
