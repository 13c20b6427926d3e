//! Pipeline engine
//!
//! The driver (Coordinator), the plan execution driver, and the pure verdict
//! router.

mod driver;
mod error;
mod executor;
mod router;

pub use driver::{CancelHandle, PipelineEngine, PipelineOutcome};
pub use error::EngineError;
pub use executor::{PlanExecutionHandler, PlanExecutor, ToolRunner};
pub use router::{Transition, route};
