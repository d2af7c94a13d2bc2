//! Feature run orchestration
//!
//! Turns feature files into Behat commands, feeds them to a
//! [`ParallelExecutor`] and decides what happens to each finished process:
//! timeouts go to the back of the queue, failures and pending runs are
//! retried within the budget, everything else is final.

use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use super::parallel::{ParallelExecutor, TaskListener, TaskQueue};
use super::process::ProcessOutcome;
use crate::config::RunConfig;
use crate::models::{RunSummary, ScenarioReport, Verdict};
use crate::utils::{feature_path, format_duration, Timer};

type CompletionCallback = Box<dyn FnOnce(&RunSummary) + Send>;

/// Runs a set of feature files in parallel
pub struct FeatureRunner {
    config: RunConfig,
    /// Command string to the feature file it runs
    tasks: HashMap<String, String>,
    /// Failure retries consumed per command
    retries: HashMap<String, u32>,
    summary: RunSummary,
    timer: Timer,
    on_complete: Option<CompletionCallback>,
}

impl FeatureRunner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            tasks: HashMap::new(),
            retries: HashMap::new(),
            summary: RunSummary::new(0),
            timer: Timer::start(),
            on_complete: None,
        }
    }

    /// Called once with the final summary when every task is done
    pub fn on_complete(mut self, callback: impl FnOnce(&RunSummary) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Build the Behat command for a feature file:
    /// `{bin} [-c {config}] [{flags}] {base_dir/file}`
    pub fn build_command(&self, file: &str) -> String {
        let config_opt = self
            .config
            .config
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| format!("-c {c}"));
        let file_path = feature_path(&self.config.base_dir, file);

        [
            Some(self.config.bin.clone()),
            config_opt,
            Some(self.config.flags.trim().to_string()).filter(|f| !f.is_empty()),
            Some(file_path),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Run every file to completion and return the summary
    pub async fn run(mut self, files: Vec<String>, mut executor: ParallelExecutor) -> RunSummary {
        self.timer = Timer::start();
        self.summary = RunSummary::new(files.len());

        info!(
            "Found {} feature file(s). Running {} at a time.",
            files.len(),
            executor.max_concurrent()
        );

        for file in files {
            let command = self.build_command(&file);
            self.tasks.insert(command.clone(), file);
            executor.add_task(command);
        }

        executor.start(&mut self).await;
        self.summary
    }

    fn file_for<'a>(&'a self, command: &'a str) -> &'a str {
        self.tasks.get(command).map(String::as_str).unwrap_or(command)
    }

    /// Retry within budget, otherwise record a permanent failure
    fn retry_or_fail(&mut self, command: String, queue: &mut TaskQueue<'_>) {
        let budget = self.config.retries;
        let used = self.retries.entry(command.clone()).or_insert(0);
        let file = self
            .tasks
            .get(&command)
            .cloned()
            .unwrap_or_else(|| command.clone());

        if *used < budget {
            *used += 1;
            info!("Retrying: {} {} of {} time(s)", file, used, budget);
            self.summary.retries += 1;
            queue.add_task(command);
        } else {
            warn!("Feature failed: {}", file);
            self.summary.failed.push(file);
        }
    }
}

impl TaskListener for FeatureRunner {
    fn task_started(&mut self, command: &str) {
        self.summary.executions += 1;
        info!("Started: {}", command);
    }

    fn task_finished(&mut self, outcome: ProcessOutcome, queue: &mut TaskQueue<'_>) {
        if let Some(ref err) = outcome.error {
            error!("err: {}", err);
        }
        if !outcome.stderr.is_empty() {
            error!("stderr:\n{}", outcome.stderr);
        }
        if self.config.verbose && !outcome.stdout.is_empty() {
            info!("stdout:\n{}", outcome.stdout);
        }

        let verdict = Verdict::classify(&outcome);
        let report = ScenarioReport::parse(&outcome.stdout);
        let file = self.file_for(&outcome.command).to_string();
        debug!(
            "{} finished as {} after {}ms",
            file,
            verdict,
            outcome.duration.as_millis()
        );

        match verdict {
            Verdict::Timeout => {
                self.summary.timeouts += 1;
                queue.add_task(outcome.command.clone());
                info!(
                    "Timeout: {} - added to the back of the queue ({} waiting).",
                    file,
                    queue.waiting()
                );
            }
            Verdict::Failed => error!("Failed: {} - {}", file, report.headline()),
            Verdict::Errored => {
                let err = outcome
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                error!("Error: {} - {} {}", file, err, outcome.stdout);
                self.summary.errored.push(file);
            }
            Verdict::Pending => info!("Completed: {} - {}", file, report.headline()),
            Verdict::Passed => {
                info!("Completed: {} - {}", file, report.headline());
                self.summary.passed.push(file);
            }
        }

        if verdict.is_retryable() {
            self.retry_or_fail(outcome.command, queue);
        }
    }

    fn finished(&mut self) {
        let elapsed = self.timer.elapsed();
        self.summary.elapsed_secs = elapsed.as_secs();

        info!("Finished in {}", format_duration(elapsed));
        info!("{}", self.summary.headline());

        if let Some(callback) = self.on_complete.take() {
            callback(&self.summary);
        }
    }
}
