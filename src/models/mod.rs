//! Data models for feature runs
//!
//! Outcome classification and run statistics.

mod outcome;
mod summary;

pub use outcome::{ScenarioReport, Verdict};
pub use summary::RunSummary;
