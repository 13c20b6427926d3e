//! Pipeline driver
//!
//! The Coordinator: sole owner and sole writer of the canonical state. It
//! dispatches exactly one stage handler at a time, folds the returned delta
//! through the reducer, and advances the state machine until a terminal
//! disposition. Handler failures and timeouts are phase failures consuming a
//! retry of the failing phase, never crashes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::{IterationRecord, Phase, StopReason, VerificationOutput};
use crate::handler::{HandlerRegistry, HandlerResponse};
use crate::state::{PipelineState, StateDelta, reduce};

use super::error::EngineError;
use super::router::{self, Transition};

/// Final result of a pipeline run
///
/// Present for failed runs too: the state retains the last diagnostic, the
/// full iteration history, and the machine-readable stop reason.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    pub reason: StopReason,
}

impl PipelineOutcome {
    /// Check if the run ended in terminal success
    pub fn is_success(&self) -> bool {
        self.reason.is_success()
    }
}

/// Handle for requesting cooperative cancellation of a running pipeline
///
/// The engine honors the request at the next phase boundary; a handler that
/// is already running finishes (or times out) first.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The refinement pipeline engine
pub struct PipelineEngine {
    config: EngineConfig,
    handlers: HandlerRegistry,
    cancelled: Arc<AtomicBool>,
}

impl PipelineEngine {
    /// Create an engine from configuration and a handler registry
    pub fn new(config: EngineConfig, handlers: HandlerRegistry) -> Self {
        Self {
            config,
            handlers,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cancelling the current run at the next phase boundary
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    /// Drive one task from input to a terminal state
    pub async fn run(&self, input: impl Into<String>) -> eyre::Result<PipelineOutcome> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut state = PipelineState::new(input, &self.config);
        info!(run_id = %state.run_id, "pipeline started");

        while !state.control.is_terminal() {
            // Cooperative checkpoint: cancellation lands between phases only
            if self.cancelled.load(Ordering::SeqCst) {
                let reason = StopReason::Cancelled;
                warn!(run_id = %state.run_id, phase = %state.control.current_phase, "run cancelled");
                let record = IterationRecord::new(
                    state.control.total_iterations,
                    state.control.current_phase,
                )
                .with_result_version(state.version_tag())
                .with_action(reason.to_string());
                state.history.push(record);
                state.control.fail(reason);
                break;
            }

            // The global ceiling gates every dispatch, even mid-phase with no
            // verdict in sight
            if state.control.iterations_exhausted() {
                let reason = StopReason::IterationBudgetExceeded {
                    max_iterations: state.control.max_iterations,
                };
                warn!(run_id = %state.run_id, phase = %state.control.current_phase, %reason, "forced failure");
                let record = IterationRecord::new(
                    state.control.total_iterations,
                    state.control.current_phase,
                )
                .with_result_version(state.version_tag())
                .with_action(reason.to_string());
                state.history.push(record);
                state.error = Some(reason.to_string());
                state.control.fail(reason);
                break;
            }

            let phase = state.control.current_phase;
            let iteration = state.control.begin_iteration();
            debug!(run_id = %state.run_id, iteration, %phase, "dispatching handler");

            match self.invoke_handler(&state, phase).await {
                Err(error) if !error.is_phase_failure() => return Err(error.into()),
                Err(error) => self.record_phase_failure(&mut state, phase, iteration, &error),
                Ok(response) => {
                    let diagnostic = response.diagnostic;
                    state = reduce::apply(&state, response.delta);
                    self.advance(&mut state, phase, iteration, diagnostic);
                }
            }
        }

        let reason = state
            .control
            .stop_reason
            .clone()
            .ok_or_else(|| eyre::eyre!("pipeline terminated without a stop reason"))?;

        info!(
            run_id = %state.run_id,
            iterations = state.control.total_iterations,
            %reason,
            "pipeline finished"
        );

        Ok(PipelineOutcome { state, reason })
    }

    /// Invoke one handler under its configured deadline
    async fn invoke_handler(
        &self,
        state: &PipelineState,
        phase: Phase,
    ) -> Result<HandlerResponse, EngineError> {
        let handler = self
            .handlers
            .get(phase)
            .ok_or(EngineError::MissingHandler(phase))?;

        let timeout_ms = self.config.timeouts.for_phase(phase);
        let feedback = state.verification.clone();

        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            handler.handle(state, feedback.as_ref()),
        )
        .await
        {
            Err(_) => Err(EngineError::HandlerTimeout { phase, timeout_ms }),
            Ok(Err(e)) => Err(EngineError::HandlerFailed {
                phase,
                message: e.to_string(),
            }),
            Ok(Ok(response)) => Ok(response),
        }
    }

    /// Post-phase bookkeeping: forward transitions, plan gating, routing
    fn advance(
        &self,
        state: &mut PipelineState,
        phase: Phase,
        iteration: u32,
        diagnostic: Option<VerificationOutput>,
    ) {
        match phase {
            Phase::Comprehension | Phase::Execution => {
                // next() is Some for every phase but verification
                let next = phase.next().unwrap_or(Phase::Verification);
                state.control.current_phase = next;
                let record = IterationRecord::new(iteration, phase)
                    .with_result_version(state.version_tag())
                    .with_action(format!("{phase} complete, advancing to {next}"));
                state.history.push(record);
            }

            Phase::Planning => self.accept_or_reject_plan(state, iteration),

            Phase::Verification => {
                let diagnostic = match diagnostic.or_else(|| state.verification.clone()) {
                    Some(d) => d,
                    None => {
                        self.record_phase_failure(
                            state,
                            phase,
                            iteration,
                            &EngineError::MissingDiagnostic,
                        );
                        return;
                    }
                };
                self.apply_routing(state, iteration, diagnostic);
            }
        }
    }

    /// Gate a freshly produced plan: a failing plan is rejected outright and
    /// consumes one planning retry
    fn accept_or_reject_plan(&self, state: &mut PipelineState, iteration: u32) {
        let accepted = match state.planning.as_ref() {
            None => Err(EngineError::MissingPlan),
            Some(planning) => match planning.plan.validate() {
                Err(e) => Err(EngineError::Plan(e)),
                Ok(()) => Ok((planning.plan.len(), planning.workspace_seed.clone())),
            },
        };

        match accepted {
            Err(error) => self.record_phase_failure(state, Phase::Planning, iteration, &error),
            Ok((tasks, seed)) => {
                // The seed goes through the reducer like any other update
                let next = reduce::apply(state, StateDelta::empty().with_workspace(seed));
                *state = next;
                state.control.current_phase = Phase::Execution;

                let record = IterationRecord::new(iteration, Phase::Planning)
                    .with_result_version(state.version_tag())
                    .with_action(format!("plan accepted ({tasks} tasks), advancing to execution"));
                state.history.push(record);
            }
        }
    }

    /// Apply the routed transition for a verification result
    fn apply_routing(
        &self,
        state: &mut PipelineState,
        iteration: u32,
        diagnostic: VerificationOutput,
    ) {
        let transition = router::route(&diagnostic, &state.control);

        let mut record = IterationRecord::new(iteration, Phase::Verification)
            .with_result_version(state.version_tag())
            .with_verdict(diagnostic.verdict)
            .with_issues(diagnostic.issues_summary());

        match transition {
            Transition::Complete(reason) => {
                info!(run_id = %state.run_id, %reason, "verification accepted result");
                record = record.with_action(reason.to_string());
                state.control.complete(reason);
            }
            Transition::Fail(reason) => {
                warn!(run_id = %state.run_id, %reason, "verification terminated pipeline");
                record = record.with_action(reason.to_string());
                state.error = Some(reason.to_string());
                state.control.fail(reason);
            }
            Transition::Enter(target) => {
                let retries = state.control.note_retry(target);
                info!(run_id = %state.run_id, %target, retries, "revision requested");
                record = record.with_action(format!("revision routed to {target} (retry {retries})"));
                state.control.current_phase = target;
            }
        }

        state.history.push(record);
    }

    /// Record a phase failure, consuming one retry of the failing phase
    ///
    /// Budget exhaustion escalates to terminal failure; otherwise the engine
    /// stays in the phase and retries it on the next iteration.
    fn record_phase_failure(
        &self,
        state: &mut PipelineState,
        phase: Phase,
        iteration: u32,
        error: &EngineError,
    ) {
        warn!(run_id = %state.run_id, %phase, %error, "phase failure");
        state.error = Some(error.to_string());

        let mut record = IterationRecord::new(iteration, phase)
            .with_result_version(state.version_tag());

        if state.control.would_exceed_budget(phase) {
            let reason = StopReason::RetryBudgetExceeded {
                phase,
                budget: state.control.retry_budget(phase),
            };
            record = record.with_action(format!("{error}; {reason}"));
            state.control.fail(reason);
        } else {
            let retries = state.control.note_retry(phase);
            record = record.with_action(format!("{error}; retrying {phase} (retry {retries})"));
        }

        state.history.push(record);
    }
}
