pub mod db;
pub mod engine;
pub mod error;
pub mod types;

pub use engine::{PlanEngine, ProgressFn, MAX_STEPS, MAX_TOOL_INVOCATIONS};
pub use error::{PlanError, Result};
pub use types::{FailureAction, Plan, PlanStatus, PlanStep, StepStatus};
