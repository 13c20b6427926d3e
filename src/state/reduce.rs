//! Pure reducers
//!
//! [`apply`] folds a [`StateDelta`] into a [`PipelineState`], producing a new
//! value with a bumped version. Absent old values are treated as the empty
//! container of the field's type. Reducers perform no I/O and never touch the
//! engine-owned control block.

use crate::domain::Workspace;

use super::delta::{Overwrite, StateDelta};
use super::pipeline::PipelineState;

/// Apply a delta, producing the next state version
pub fn apply(state: &PipelineState, delta: StateDelta) -> PipelineState {
    let mut next = state.clone();
    next.version += 1;

    next.comprehension = delta.comprehension.apply(next.comprehension.take());
    next.planning = delta.planning.apply(next.planning.take());
    next.execution = delta.execution.apply(next.execution.take());
    next.verification = delta.verification.apply(next.verification.take());

    merge_workspace(&mut next.workspace, delta.workspace);
    next.notes.extend(delta.notes);
    next.history.extend(delta.history);

    if let Overwrite::Replace(error) = delta.error {
        next.error = error;
    }

    next
}

/// Merge-mode reducer: shallow key union, delta wins on conflict
pub fn merge_workspace(current: &mut Workspace, delta: Workspace) {
    for (key, value) in delta {
        current.insert(key, value);
    }
}
