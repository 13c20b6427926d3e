//! Verdict routing
//!
//! The pure decision core of the engine: a structured diagnostic goes in, a
//! state-machine transition comes out. Any advisory component (LLM or
//! otherwise) may *produce* the diagnostic; this function alone decides what
//! happens next, so the routing rules are testable without one.

use tracing::debug;

use crate::domain::{Phase, ProblemLevel, StopReason, Verdict, VerificationOutput};
use crate::state::ControlBlock;

/// The next state-machine step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Re-enter a phase for revision
    Enter(Phase),
    /// Terminal success
    Complete(StopReason),
    /// Terminal failure
    Fail(StopReason),
}

/// Decide the transition that follows a verification result
///
/// Rules, in order:
/// 1. A fatal verdict fails the pipeline regardless of remaining budget.
/// 2. `Passed` and `PassedWithWarnings` both complete it (warnings stay
///    visible in the final state, but the run is a terminal success).
/// 3. `NeedsRevision` targets the diagnostic's problem level (planning when
///    the diagnostician omitted one). Re-entry is gated first by the global
///    iteration ceiling, then by the target phase's retry budget; the first
///    exhausted budget fails the pipeline with a machine-readable reason.
///
/// The caller consumes the retry (`ControlBlock::note_retry`) when applying
/// an `Enter` transition; this function never mutates.
pub fn route(diagnostic: &VerificationOutput, control: &ControlBlock) -> Transition {
    let transition = match diagnostic.verdict {
        Verdict::FatalError => Transition::Fail(StopReason::FatalVerification),
        Verdict::Passed => Transition::Complete(StopReason::Solved),
        Verdict::PassedWithWarnings => Transition::Complete(StopReason::SolvedWithWarnings),
        Verdict::NeedsRevision => {
            let target: Phase = diagnostic
                .problem_level
                .unwrap_or(ProblemLevel::Planning)
                .into();

            if control.iterations_exhausted() {
                Transition::Fail(StopReason::IterationBudgetExceeded {
                    max_iterations: control.max_iterations,
                })
            } else if control.would_exceed_budget(target) {
                Transition::Fail(StopReason::RetryBudgetExceeded {
                    phase: target,
                    budget: control.retry_budget(target),
                })
            } else {
                Transition::Enter(target)
            }
        }
    };

    debug!(
        verdict = %diagnostic.verdict,
        problem_level = ?diagnostic.problem_level,
        ?transition,
        "routed verification result"
    );

    transition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{CheckStatus, PhaseCounts, StructuralChecks};

    fn control() -> ControlBlock {
        ControlBlock::new(&EngineConfig::default())
    }

    #[test]
    fn test_passed_completes() {
        let diag = VerificationOutput::passed("all four checks passed");
        assert_eq!(
            route(&diag, &control()),
            Transition::Complete(StopReason::Solved)
        );
    }

    #[test]
    fn test_passed_with_warnings_is_terminal_success() {
        let mut checks = StructuralChecks::all_passed();
        checks.constraints = CheckStatus::Warning;
        let diag = VerificationOutput::from_checks(checks, None, "soft warning on constraints");
        assert_eq!(
            route(&diag, &control()),
            Transition::Complete(StopReason::SolvedWithWarnings)
        );
    }

    #[test]
    fn test_fatal_fails_immediately() {
        let mut ctrl = control();
        // Plenty of budget left; fatal ignores it
        ctrl.max_retries = PhaseCounts::uniform(100);
        let diag = VerificationOutput::fatal("inconsistent problem statement");
        assert_eq!(
            route(&diag, &ctrl),
            Transition::Fail(StopReason::FatalVerification)
        );
    }

    #[test]
    fn test_needs_revision_routes_to_problem_level() {
        let diag = VerificationOutput::needs_revision(ProblemLevel::Execution, "sign error");
        assert_eq!(route(&diag, &control()), Transition::Enter(Phase::Execution));

        let diag = VerificationOutput::needs_revision(ProblemLevel::Comprehension, "misread");
        assert_eq!(
            route(&diag, &control()),
            Transition::Enter(Phase::Comprehension)
        );
    }

    #[test]
    fn test_needs_revision_without_level_defaults_to_planning() {
        let mut diag = VerificationOutput::needs_revision(ProblemLevel::Planning, "drift");
        diag.problem_level = None;
        assert_eq!(route(&diag, &control()), Transition::Enter(Phase::Planning));
    }

    #[test]
    fn test_retry_budget_exhaustion_fails() {
        let mut ctrl = control();
        ctrl.max_retries = PhaseCounts::uniform(2);
        ctrl.note_retry(Phase::Planning);
        ctrl.note_retry(Phase::Planning);

        let diag = VerificationOutput::needs_revision(ProblemLevel::Planning, "still wrong");
        assert_eq!(
            route(&diag, &ctrl),
            Transition::Fail(StopReason::RetryBudgetExceeded {
                phase: Phase::Planning,
                budget: 2,
            })
        );
    }

    #[test]
    fn test_iteration_ceiling_outranks_retry_budget() {
        let mut ctrl = control();
        ctrl.max_iterations = 3;
        ctrl.total_iterations = 3;

        let diag = VerificationOutput::needs_revision(ProblemLevel::Planning, "needs more work");
        assert_eq!(
            route(&diag, &ctrl),
            Transition::Fail(StopReason::IterationBudgetExceeded { max_iterations: 3 })
        );
    }

    #[test]
    fn test_passed_at_ceiling_still_completes() {
        // A terminal verdict consumes no further iterations
        let mut ctrl = control();
        ctrl.max_iterations = 4;
        ctrl.total_iterations = 4;

        let diag = VerificationOutput::passed("done on the last allowed pass");
        assert_eq!(
            route(&diag, &ctrl),
            Transition::Complete(StopReason::Solved)
        );
    }

    #[test]
    fn test_routing_is_pure() {
        let ctrl = control();
        let diag = VerificationOutput::needs_revision(ProblemLevel::Execution, "retryable");
        let before = ctrl.clone();
        let _ = route(&diag, &ctrl);
        let _ = route(&diag, &ctrl);
        assert_eq!(ctrl, before);
    }
}
