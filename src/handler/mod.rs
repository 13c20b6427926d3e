//! Stage handler contract
//!
//! The pluggable unit behind each phase. Handlers receive an immutable
//! snapshot of the pipeline state plus any prior verification feedback, and
//! return a delta. They never mutate shared state and must be safely
//! retriable with the same feedback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Phase, VerificationOutput};
use crate::state::{PipelineState, StateDelta};

/// What a handler hands back to the engine
#[derive(Debug, Clone, Default)]
pub struct HandlerResponse {
    /// The stage's contribution to the pipeline state
    pub delta: StateDelta,

    /// Diagnostic, required from verification handlers
    pub diagnostic: Option<VerificationOutput>,
}

impl HandlerResponse {
    /// A response carrying only a delta
    pub fn delta(delta: StateDelta) -> Self {
        Self {
            delta,
            diagnostic: None,
        }
    }

    /// A verification response: the diagnostic doubles as the stage fragment
    pub fn diagnostic(diagnostic: VerificationOutput) -> Self {
        Self {
            delta: StateDelta::verification(diagnostic.clone()),
            diagnostic: Some(diagnostic),
        }
    }

    /// Builder: attach a diagnostic to an existing delta
    pub fn with_diagnostic(mut self, diagnostic: VerificationOutput) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }
}

/// A pluggable stage implementation
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Phase this handler implements
    fn phase(&self) -> Phase;

    /// Run the stage against an immutable snapshot
    ///
    /// `feedback` carries the full verification diagnostic when the stage is
    /// re-entered for revision; `None` on the first pass.
    async fn handle(
        &self,
        snapshot: &PipelineState,
        feedback: Option<&VerificationOutput>,
    ) -> eyre::Result<HandlerResponse>;
}

/// Registry of stage handlers, one per phase
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Phase, Arc<dyn StageHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a handler under its declared phase
    ///
    /// A later registration for the same phase replaces the earlier one.
    pub fn with(mut self, handler: Arc<dyn StageHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Register a handler under its declared phase
    pub fn register(&mut self, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(handler.phase(), handler);
    }

    /// Look up the handler for a phase
    pub fn get(&self, phase: Phase) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&phase).cloned()
    }

    /// Phases with no registered handler
    pub fn missing(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|p| !self.handlers.contains_key(p))
            .collect()
    }

    /// Check that every phase has a handler
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}
