//! Outcome classification for feature runs
//!
//! Maps a finished process to a verdict and extracts the human-readable
//! summary lines Behat prints at the end of a run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::executor::ProcessOutcome;

/// Exit code for an explicit test failure
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Exit code a runner may use to report it gave up on time
pub const TIMEOUT_EXIT_CODE: i32 = 13;

/// Marker in the scenario summary line for pending or undefined steps
pub const PENDING_MARKER: &str = "pending";

/// Classification of a finished feature run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Ran out of time; requeued without consuming retries
    Timeout,
    /// Exit code 1
    Failed,
    /// Any other error; reported and never retried
    Errored,
    /// Clean exit with pending steps
    Pending,
    Passed,
}

impl Verdict {
    /// Classify a finished process, first matching rule wins
    pub fn classify(outcome: &ProcessOutcome) -> Self {
        match &outcome.error {
            Some(err) if err.killed() || err.code() == Some(TIMEOUT_EXIT_CODE) => Verdict::Timeout,
            Some(err) if err.code() == Some(FAILURE_EXIT_CODE) => Verdict::Failed,
            Some(_) => Verdict::Errored,
            None if ScenarioReport::parse(&outcome.stdout).is_pending() => Verdict::Pending,
            None => Verdict::Passed,
        }
    }

    /// Whether the retry policy applies
    pub fn is_retryable(&self) -> bool {
        matches!(self, Verdict::Failed | Verdict::Pending)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Timeout => write!(f, "TIMEOUT"),
            Verdict::Failed => write!(f, "FAILED"),
            Verdict::Errored => write!(f, "ERROR"),
            Verdict::Pending => write!(f, "PENDING"),
            Verdict::Passed => write!(f, "PASSED"),
        }
    }
}

/// Summary lines from the tail of a Behat run.
///
/// Behat ends its output with the scenario count, the step count and the
/// duration, followed by a trailing newline:
///
/// ```text
/// 3 scenarios (2 passed, 1 pending)
/// 12 steps (10 passed, 2 pending)
/// 0m1.42s (9.87Mb)
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScenarioReport<'a> {
    /// Fourth-from-last line
    pub scenarios: Option<&'a str>,
    /// Second-from-last line
    pub duration: Option<&'a str>,
    output: &'a str,
}

impl<'a> ScenarioReport<'a> {
    pub fn parse(stdout: &'a str) -> Self {
        let lines: Vec<&str> = stdout.split('\n').collect();
        let from_end = |n: usize| lines.len().checked_sub(n).map(|i| lines[i]);

        Self {
            scenarios: from_end(4),
            duration: from_end(2),
            output: stdout,
        }
    }

    /// Whether the run reported pending steps.
    ///
    /// Looks at the scenario line; falls back to the whole output when there
    /// are too few lines to locate it.
    pub fn is_pending(&self) -> bool {
        match self.scenarios {
            Some(line) => line.contains(PENDING_MARKER),
            None => self.output.contains(PENDING_MARKER),
        }
    }

    /// `"<scenarios> in <duration>"`, with `?` for missing lines
    pub fn headline(&self) -> String {
        format!(
            "{} in {}",
            self.scenarios.unwrap_or("?"),
            self.duration.unwrap_or("?")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecError;
    use std::time::Duration;

    const PASSED_OUTPUT: &str = "Feature: Login\n\n\
        1 scenario (1 passed)\n\
        4 steps (4 passed)\n\
        0m0.52s (8.11Mb)\n";

    const PENDING_OUTPUT: &str = "Feature: Checkout\n\n\
        2 scenarios (1 passed, 1 pending)\n\
        8 steps (7 passed, 1 pending)\n\
        0m1.20s (9.02Mb)\n";

    fn outcome(error: Option<ExecError>, stdout: &str) -> ProcessOutcome {
        ProcessOutcome {
            command: "bin/behat login.feature".to_string(),
            error,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_parse_summary_lines() {
        let report = ScenarioReport::parse(PASSED_OUTPUT);
        assert_eq!(report.scenarios, Some("1 scenario (1 passed)"));
        assert_eq!(report.duration, Some("0m0.52s (8.11Mb)"));
        assert_eq!(
            report.headline(),
            "1 scenario (1 passed) in 0m0.52s (8.11Mb)"
        );
        assert!(!report.is_pending());
    }

    #[test]
    fn test_parse_short_output() {
        let report = ScenarioReport::parse("oops\n");
        assert_eq!(report.scenarios, None);
        assert_eq!(report.duration, Some("oops"));
        assert_eq!(report.headline(), "? in oops");

        let empty = ScenarioReport::parse("");
        assert_eq!(empty.headline(), "? in ?");
        assert!(!empty.is_pending());
    }

    #[test]
    fn test_pending_only_checked_on_scenario_line() {
        let output = "Given a pending order\n1 scenario (1 passed)\n4 steps (4 passed)\n0m0.1s\n";
        assert!(!ScenarioReport::parse(output).is_pending());
        assert!(ScenarioReport::parse(PENDING_OUTPUT).is_pending());
        assert!(ScenarioReport::parse("1 pending\n").is_pending());
    }

    #[test]
    fn test_classify() {
        let cases = [
            (Some(ExecError::TimedOut(Duration::from_secs(1))), "", Verdict::Timeout),
            (Some(ExecError::ExitCode(TIMEOUT_EXIT_CODE)), "", Verdict::Timeout),
            (Some(ExecError::ExitCode(FAILURE_EXIT_CODE)), PENDING_OUTPUT, Verdict::Failed),
            (Some(ExecError::ExitCode(255)), "", Verdict::Errored),
            (Some(ExecError::Signal(9)), "", Verdict::Errored),
            (Some(ExecError::Spawn("not found".into())), "", Verdict::Errored),
            (None, PENDING_OUTPUT, Verdict::Pending),
            (None, PASSED_OUTPUT, Verdict::Passed),
            (None, "", Verdict::Passed),
        ];

        for (error, stdout, expected) in cases {
            let outcome = outcome(error, stdout);
            assert_eq!(Verdict::classify(&outcome), expected, "{outcome:?}");
        }
    }

    #[test]
    fn test_retryable() {
        assert!(Verdict::Failed.is_retryable());
        assert!(Verdict::Pending.is_retryable());
        assert!(!Verdict::Timeout.is_retryable());
        assert!(!Verdict::Errored.is_retryable());
        assert!(!Verdict::Passed.is_retryable());
    }
}
