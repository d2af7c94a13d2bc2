//! parallel-behat - run Behat feature files in parallel
//!
//! Each feature file becomes one Behat process. Processes run under a
//! concurrency cap with a per-process timeout; timeouts are requeued,
//! failures and pending features are retried within a budget, and the run
//! ends once every feature reached a final result.
//!
//! ```no_run
//! use parallel_behat::config::RunConfig;
//! use parallel_behat::executor::{FeatureRunner, ParallelExecutor};
//!
//! # async fn example() {
//! let config = RunConfig {
//!     max_processes: 4,
//!     retries: 1,
//!     ..Default::default()
//! };
//! let executor = ParallelExecutor::new(config.max_processes)
//!     .with_options(config.process_options());
//! let summary = FeatureRunner::new(config)
//!     .run(vec!["features/login.feature".to_string()], executor)
//!     .await;
//! assert!(summary.is_success());
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod executor;
pub mod models;
pub mod utils;
