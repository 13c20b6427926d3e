//! Read-only audit access to the iteration history

use crate::domain::{IterationRecord, Phase, Verdict};

/// Read-only view over a pipeline's iteration history
///
/// Exposed for monitoring and debugging; the underlying records are
/// append-only and never mutated once written.
#[derive(Debug, Clone, Copy)]
pub struct AuditTrail<'a> {
    records: &'a [IterationRecord],
}

impl<'a> AuditTrail<'a> {
    /// Wrap a history slice
    pub fn new(records: &'a [IterationRecord]) -> Self {
        Self { records }
    }

    /// All records in order
    pub fn records(&self) -> &'a [IterationRecord] {
        self.records
    }

    /// Number of recorded iterations
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recent record
    pub fn last(&self) -> Option<&'a IterationRecord> {
        self.records.last()
    }

    /// Records for one phase, in order
    pub fn for_phase(&self, phase: Phase) -> impl Iterator<Item = &'a IterationRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    /// Number of passes through one phase
    pub fn phase_passes(&self, phase: Phase) -> usize {
        self.for_phase(phase).count()
    }

    /// The most recent verdict, if any verification has run
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.records.iter().rev().find_map(|r| r.verdict)
    }

    /// Plain-text rendering for logs and monitoring
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in self.records {
            let verdict = record
                .verdict
                .map(|v| format!(" [{v}]"))
                .unwrap_or_default();
            out.push_str(&format!(
                "#{} {} ({}){}: {}\n",
                record.iteration, record.phase, record.result_version, verdict, record.action
            ));
        }
        out
    }
}
