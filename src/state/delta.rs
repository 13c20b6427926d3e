//! Stage deltas and merge-mode declarations
//!
//! Every field of [`StateDelta`] carries exactly one merge mode, declared by
//! its type: [`Overwrite`] fields replace, `Vec` fields append, the workspace
//! merges by key union. Nothing is inferred from payload shape.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ComprehensionOutput, ExecutionOutput, IterationRecord, PlanningOutput, VerificationOutput,
    Workspace,
};

/// Override-mode cell: either leave the accumulated value alone or replace it
///
/// `Replace` carries its payload verbatim and ignores the old value, which
/// makes double-application a no-op beyond the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overwrite<T> {
    /// Leave the accumulated value untouched
    Keep,
    /// Replace the accumulated value with the payload
    Replace(T),
}

impl<T> Default for Overwrite<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> Overwrite<T> {
    /// Apply to the accumulated value
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Keep => current,
            Self::Replace(value) => Some(value),
        }
    }

    /// Check if this cell leaves the value untouched
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// A stage's contribution to the pipeline state
///
/// Handlers build deltas; the reducer folds them into a new state value.
/// Control metadata is engine-owned and cannot be touched from a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StateDelta {
    /// Override: comprehension fragment
    pub comprehension: Overwrite<ComprehensionOutput>,

    /// Override: planning fragment
    pub planning: Overwrite<PlanningOutput>,

    /// Override: execution fragment
    pub execution: Overwrite<ExecutionOutput>,

    /// Override: verification fragment
    pub verification: Overwrite<VerificationOutput>,

    /// Merge: workspace keys to add or supersede
    pub workspace: Workspace,

    /// Append: stage notes
    pub notes: Vec<String>,

    /// Append: audit records
    pub history: Vec<IterationRecord>,

    /// Override: surfaced error message (`Replace(None)` clears it)
    pub error: Overwrite<Option<String>>,
}

impl StateDelta {
    /// A delta that changes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// A delta carrying a comprehension fragment
    pub fn comprehension(output: ComprehensionOutput) -> Self {
        Self {
            comprehension: Overwrite::Replace(output),
            ..Default::default()
        }
    }

    /// A delta carrying a planning fragment
    pub fn planning(output: PlanningOutput) -> Self {
        Self {
            planning: Overwrite::Replace(output),
            ..Default::default()
        }
    }

    /// A delta carrying an execution fragment
    pub fn execution(output: ExecutionOutput) -> Self {
        Self {
            execution: Overwrite::Replace(output),
            ..Default::default()
        }
    }

    /// A delta carrying a verification fragment
    pub fn verification(output: VerificationOutput) -> Self {
        Self {
            verification: Overwrite::Replace(output),
            ..Default::default()
        }
    }

    /// Builder: merge workspace entries
    pub fn with_workspace(mut self, workspace: Workspace) -> Self {
        self.workspace = workspace;
        self
    }

    /// Builder: append a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Builder: force-replace the error message
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Overwrite::Replace(Some(message.into()));
        self
    }

    /// Check if the delta changes nothing
    pub fn is_empty(&self) -> bool {
        self.comprehension.is_keep()
            && self.planning.is_keep()
            && self.execution.is_keep()
            && self.verification.is_keep()
            && self.workspace.is_empty()
            && self.notes.is_empty()
            && self.history.is_empty()
            && self.error.is_keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_keep_preserves() {
        let cell: Overwrite<u32> = Overwrite::Keep;
        assert_eq!(cell.apply(Some(7)), Some(7));
        let cell: Overwrite<u32> = Overwrite::Keep;
        assert_eq!(cell.apply(None), None);
    }

    #[test]
    fn test_overwrite_replace_ignores_old() {
        let cell = Overwrite::Replace(9u32);
        assert_eq!(cell.apply(Some(7)), Some(9));
        let cell = Overwrite::Replace(9u32);
        assert_eq!(cell.apply(None), Some(9));
    }

    #[test]
    fn test_overwrite_serde_carries_replace_tag() {
        let cell = Overwrite::Replace(3u32);
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, "{\"replace\":3}");
        let keep: Overwrite<u32> = Overwrite::Keep;
        assert_eq!(serde_json::to_string(&keep).unwrap(), "\"keep\"");
    }

    #[test]
    fn test_empty_delta() {
        assert!(StateDelta::empty().is_empty());
        assert!(!StateDelta::empty().with_note("n").is_empty());
        assert!(!StateDelta::comprehension(ComprehensionOutput::default()).is_empty());
    }

    #[test]
    fn test_error_override() {
        let delta = StateDelta::empty().with_error("handler blew up");
        assert_eq!(
            delta.error,
            Overwrite::Replace(Some("handler blew up".to_string()))
        );
    }
}
