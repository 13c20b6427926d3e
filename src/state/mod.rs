//! Canonical state record and merge machinery
//!
//! [`PipelineState`] is the single versioned record the engine owns;
//! [`StateDelta`] is what a stage contributes; [`reduce::apply`] folds one
//! into the other, producing a new state value.

mod delta;
mod pipeline;
pub mod reduce;

pub use delta::{Overwrite, StateDelta};
pub use pipeline::{ControlBlock, PipelineState};
