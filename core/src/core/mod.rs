pub mod context;
pub mod context_data;
pub mod control;
pub mod step;

pub use context::{BoxFuture, Handler};
pub use context_data::ContextData;
pub use control::{RunOutcome, StepControl};
pub use step::{SkipCondition, StepDef};
