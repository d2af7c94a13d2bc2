//! Test execution engine
//!
//! A bounded-concurrency process scheduler and the feature runner that
//! drives it.

mod parallel;
mod process;
mod runner;

pub use parallel::{ExecutorHandle, ParallelExecutor, TaskListener, TaskQueue};
pub use process::{ExecError, ProcessOptions, ProcessOutcome};
pub use runner::FeatureRunner;
