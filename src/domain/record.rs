//! Iteration audit records
//!
//! One record per phase invocation, appended to the pipeline's history and
//! never mutated once written.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::outputs::Verdict;
use super::phase::Phase;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Audit entry for a single pass through one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Global iteration number (1-indexed)
    pub iteration: u32,

    /// Phase that ran
    pub phase: Phase,

    /// State version tag after this iteration (e.g. "v3")
    pub result_version: String,

    /// Verdict, for verification iterations
    pub verdict: Option<Verdict>,

    /// One-line summaries of diagnostic findings
    pub issues_summary: Vec<String>,

    /// What the engine did with the result
    pub action: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl IterationRecord {
    /// Create a record for the given iteration and phase
    pub fn new(iteration: u32, phase: Phase) -> Self {
        Self {
            iteration,
            phase,
            result_version: String::new(),
            verdict: None,
            issues_summary: Vec::new(),
            action: String::new(),
            created_at: now_ms(),
        }
    }

    /// Builder: set the state version tag
    pub fn with_result_version(mut self, tag: impl Into<String>) -> Self {
        self.result_version = tag.into();
        self
    }

    /// Builder: set the verdict
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    /// Builder: set the issue summaries
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues_summary = issues;
        self
    }

    /// Builder: set the action taken
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = IterationRecord::new(3, Phase::Verification)
            .with_result_version("v7")
            .with_verdict(Verdict::NeedsRevision)
            .with_issues(vec!["[logical flaw] broken reference".to_string()])
            .with_action("revision routed to planning (retry 1)");

        assert_eq!(record.iteration, 3);
        assert_eq!(record.phase, Phase::Verification);
        assert_eq!(record.result_version, "v7");
        assert_eq!(record.verdict, Some(Verdict::NeedsRevision));
        assert_eq!(record.issues_summary.len(), 1);
        assert!(record.created_at > 0);
    }

    #[test]
    fn test_record_serde() {
        let record = IterationRecord::new(1, Phase::Comprehension).with_action("advanced to planning");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: IterationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
