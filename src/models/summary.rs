//! Run summary
//!
//! Tallies of a whole parallel run, written out as a report when requested.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::format_duration;

/// Statistics for one run of the feature suite
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    /// Number of feature files submitted
    pub total: usize,
    /// Processes started, including retries and timeout requeues
    pub executions: u32,
    pub passed: Vec<String>,
    /// Files that failed after exhausting their retry budget
    pub failed: Vec<String>,
    /// Files that ended with an unexpected error
    pub errored: Vec<String>,
    pub timeouts: u32,
    pub retries: u32,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_secs: 0,
            total,
            executions: 0,
            passed: Vec::new(),
            failed: Vec::new(),
            errored: Vec::new(),
            timeouts: 0,
            retries: 0,
        }
    }

    /// No permanent failures and no unexpected errors
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.errored.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs(self.elapsed_secs)
    }

    /// One-line description of the run
    pub fn headline(&self) -> String {
        format!(
            "{} passed, {} failed, {} errored of {} feature(s) ({} runs, {} retries, {} timeouts) in {}",
            self.passed.len(),
            self.failed.len(),
            self.errored.len(),
            self.total,
            self.executions,
            self.retries,
            self.timeouts,
            format_duration(self.elapsed())
        )
    }

    /// Write the summary as YAML or JSON depending on the file extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let is_yaml = path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);

        let content = if is_yaml {
            serde_yaml::to_string(self).context("Failed to serialize run summary")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize run summary")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }
}
