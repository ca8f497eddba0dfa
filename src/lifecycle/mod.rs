//! Model run lifecycle: state machine, run registry and result handling

pub mod manager;
pub mod probe;
pub mod processor;
mod registry;
pub mod state;
pub mod types;

pub use manager::LifecycleManager;
pub use probe::{CompletionProbe, ImmediateCompletion, JobStatus};
pub use processor::{InlineOnly, Passthrough, ResultProcessor};
pub use state::ModelState;
pub use types::{RunConfig, RunInfo, RunResult};
