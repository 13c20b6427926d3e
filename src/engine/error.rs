//! Engine error taxonomy
//!
//! Phase-failure causes are locally recoverable: the engine records them,
//! consumes a retry of the failing phase, and re-enters it. Only budget
//! exhaustion and fatal verdicts (expressed as [`crate::domain::StopReason`])
//! terminate the pipeline.

use thiserror::Error;

use crate::domain::{Phase, PlanValidationError};

/// Errors raised while driving the pipeline
#[derive(Debug, Error)]
pub enum EngineError {
    /// Handler exceeded its configured deadline (phase failure, not a crash)
    #[error("{phase} handler timed out after {timeout_ms}ms")]
    HandlerTimeout { phase: Phase, timeout_ms: u64 },

    /// Handler returned an error
    #[error("{phase} handler failed: {message}")]
    HandlerFailed { phase: Phase, message: String },

    /// Planning produced no plan fragment
    #[error("planning produced no plan")]
    MissingPlan,

    /// Verification produced no diagnostic
    #[error("verification produced no diagnostic")]
    MissingDiagnostic,

    /// Malformed plan, rejected outright before any task execution
    #[error(transparent)]
    Plan(#[from] PlanValidationError),

    /// No handler registered for a phase (configuration error, not retriable)
    #[error("no handler registered for phase {0}")]
    MissingHandler(Phase),
}

impl EngineError {
    /// Check whether the error is recoverable by retrying the phase
    pub fn is_phase_failure(&self) -> bool {
        !matches!(self, Self::MissingHandler(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::HandlerTimeout {
            phase: Phase::Execution,
            timeout_ms: 500,
        };
        assert_eq!(err.to_string(), "execution handler timed out after 500ms");

        let err = EngineError::Plan(PlanValidationError::DuplicateTaskId("t1".to_string()));
        assert_eq!(err.to_string(), "duplicate task id: t1");
    }

    #[test]
    fn test_phase_failure_classification() {
        assert!(
            EngineError::HandlerFailed {
                phase: Phase::Planning,
                message: "x".to_string()
            }
            .is_phase_failure()
        );
        assert!(!EngineError::MissingHandler(Phase::Planning).is_phase_failure());
    }
}
