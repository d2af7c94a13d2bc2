//! Parallel command execution
//!
//! Runs queued shell commands as child processes, never more than
//! `max_concurrent` at a time. A single control loop owns the queue and the
//! running count; child processes report back over a channel and every
//! lifecycle notification is dispatched from that loop, one at a time.

use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::process::{self, ProcessOptions, ProcessOutcome};

/// Receives lifecycle notifications from a [`ParallelExecutor`].
///
/// Handlers run inside the executor's control loop, so anything submitted to
/// the [`TaskQueue`] from `task_finished` is queued before the executor
/// refills free slots or decides the run is over.
pub trait TaskListener {
    /// A command's process was spawned
    fn task_started(&mut self, command: &str);

    /// A command's process terminated
    fn task_finished(&mut self, outcome: ProcessOutcome, queue: &mut TaskQueue<'_>);

    /// The queue is empty and nothing is running. Fired exactly once.
    fn finished(&mut self);
}

/// Submission access to the pending queue from inside a handler
pub struct TaskQueue<'a> {
    pending: &'a mut VecDeque<String>,
}

impl<'a> TaskQueue<'a> {
    pub(crate) fn new(pending: &'a mut VecDeque<String>) -> Self {
        Self { pending }
    }

    /// Append a command to the back of the queue
    pub fn add_task(&mut self, command: impl Into<String>) {
        self.pending.push_back(command.into());
    }

    /// Number of commands waiting to start
    pub fn waiting(&self) -> usize {
        self.pending.len()
    }
}

/// Cloneable handle for submitting commands while a run is active
#[derive(Clone, Debug)]
pub struct ExecutorHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl ExecutorHandle {
    /// Append a command to the back of the queue.
    ///
    /// Commands sent after the run has finished are dropped.
    pub fn add_task(&self, command: impl Into<String>) {
        if let Err(e) = self.tx.send(command.into()) {
            debug!("Executor already finished, dropping '{}'", e.0);
        }
    }
}

enum LoopEvent {
    Exited(ProcessOutcome),
    Submitted(String),
    Closed,
}

/// Bounded-concurrency process scheduler
pub struct ParallelExecutor {
    max_concurrent: usize,
    options: ProcessOptions,
    pending: VecDeque<String>,
    running: usize,
    exit_tx: mpsc::UnboundedSender<ProcessOutcome>,
    exit_rx: mpsc::UnboundedReceiver<ProcessOutcome>,
    submit_tx: mpsc::UnboundedSender<String>,
    submit_rx: mpsc::UnboundedReceiver<String>,
}

impl ParallelExecutor {
    /// Create an executor running at most `max_concurrent` processes (minimum 1)
    pub fn new(max_concurrent: usize) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();

        Self {
            max_concurrent: max_concurrent.max(1),
            options: ProcessOptions::default(),
            pending: VecDeque::new(),
            running: 0,
            exit_tx,
            exit_rx,
            submit_tx,
            submit_rx,
        }
    }

    /// Set the options used to spawn every process
    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Append a command to the back of the queue
    pub fn add_task(&mut self, command: impl Into<String>) {
        self.pending.push_back(command.into());
    }

    /// Handle for submitting commands from outside the listener
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            tx: self.submit_tx.clone(),
        }
    }

    /// Run until the queue is drained and every process has exited.
    ///
    /// Consumes the executor, so a run can only be started once.
    pub async fn start<L: TaskListener>(mut self, listener: &mut L) {
        debug!(
            "Starting executor with {} queued command(s), max {} concurrent",
            self.pending.len(),
            self.max_concurrent
        );

        loop {
            self.drain_submissions();
            self.fill(listener);

            if self.running == 0 && self.pending.is_empty() {
                break;
            }

            let event = tokio::select! {
                biased;
                Some(outcome) = self.exit_rx.recv() => LoopEvent::Exited(outcome),
                Some(command) = self.submit_rx.recv() => LoopEvent::Submitted(command),
                else => LoopEvent::Closed,
            };

            match event {
                LoopEvent::Exited(outcome) => {
                    self.running -= 1;
                    let mut queue = TaskQueue::new(&mut self.pending);
                    listener.task_finished(outcome, &mut queue);
                }
                LoopEvent::Submitted(command) => self.pending.push_back(command),
                LoopEvent::Closed => break,
            }
        }

        info!("All tasks finished");
        listener.finished();
    }

    fn drain_submissions(&mut self) {
        while let Ok(command) = self.submit_rx.try_recv() {
            self.pending.push_back(command);
        }
    }

    /// Launch queued commands until the concurrency limit is reached
    fn fill<L: TaskListener>(&mut self, listener: &mut L) {
        while self.running < self.max_concurrent {
            let Some(command) = self.pending.pop_front() else {
                break;
            };

            self.running += 1;
            let exit_tx = self.exit_tx.clone();

            match process::spawn(&command, &self.options) {
                Ok(child) => {
                    listener.task_started(&command);
                    let timeout = self.options.timeout;
                    tokio::spawn(async move {
                        let outcome = child.wait(timeout).await;
                        let _ = exit_tx.send(outcome);
                    });
                }
                Err(outcome) => {
                    listener.task_started(&command);
                    let _ = exit_tx.send(outcome);
                }
            }
        }
    }
}
