//! Fixed-interval scheduling of fetch cycles
//!
//! One task owns the checkpoint and alternates between sleeping and running
//! a cycle, so cycles can never overlap. A stop request interrupts the sleep
//! but lets a running cycle finish and commit.

use super::cycle::{CycleOutcome, FetchCycleEngine};
use super::HarvestError;
use crate::resume::Checkpoint;
use crate::shutdown::SharedShutdown;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// A cycle is in progress
    Running,
    /// Terminal; the scheduler cannot be restarted
    Stopped,
}

/// Totals over the scheduler's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    /// Cycles that drained every candidate
    pub cycles_completed: u64,
    /// Cycles cut short by transient source errors
    pub cycles_aborted: u64,
    /// Events handed to the sink
    pub lines_emitted: u64,
    /// Watermark held when the scheduler stopped
    pub final_watermark: i64,
}

/// Runs the fetch cycle engine on a fixed interval until stopped
pub struct Scheduler {
    engine: FetchCycleEngine,
    checkpoint: Checkpoint,
    shutdown: SharedShutdown,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// Create a scheduler, loading the checkpoint from the engine's store
    ///
    /// The polling interval and the run-immediately flag come from the
    /// engine's [`HarvesterConfig`](super::HarvesterConfig), which
    /// [`run`](Self::run) validates before the first tick.
    pub fn new(engine: FetchCycleEngine, shutdown: SharedShutdown) -> Self {
        let checkpoint = engine.load_checkpoint();
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            engine,
            checkpoint,
            shutdown,
            state,
        }
    }

    fn interval(&self) -> Duration {
        self.engine.config().polling_interval()
    }

    /// Get the in-memory checkpoint
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SchedulerState) {
        debug!(state = ?next, "Scheduler state transition");
        self.state.send_replace(next);
    }

    /// Sleep one interval; returns `false` if a stop was requested
    async fn wait_for_tick(&self) -> bool {
        if self.shutdown.is_shutdown_requested() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.interval()) => !self.shutdown.is_shutdown_requested(),
            _ = self.shutdown.wait_for_shutdown() => false,
        }
    }

    /// Run until stopped
    ///
    /// # Errors
    ///
    /// [`HarvestError::Config`] if the engine configuration is invalid,
    /// otherwise the first non-transient [`HarvestError`]; the scheduler is
    /// stopped in that case too.
    pub async fn run(mut self) -> Result<SchedulerSummary, HarvestError> {
        if let Err(reason) = self.engine.config().validate() {
            error!(%reason, "Invalid harvester configuration");
            self.transition(SchedulerState::Stopped);
            return Err(HarvestError::Config(reason));
        }

        info!(
            source_instance = %self.engine.config().source_instance,
            log_file = %self.engine.config().log_file_filter,
            interval_secs = self.interval().as_secs(),
            watermark = self.checkpoint.watermark(),
            checkpoint = %self.engine.store().path().display(),
            "Scheduler started"
        );

        let mut summary = SchedulerSummary::default();
        let mut skip_sleep = self.engine.config().run_immediately;

        loop {
            if skip_sleep {
                skip_sleep = false;
                if self.shutdown.is_shutdown_requested() {
                    break;
                }
            } else if !self.wait_for_tick().await {
                break;
            }

            self.transition(SchedulerState::Running);
            let result = self.engine.run_cycle(&mut self.checkpoint).await;

            match result {
                Ok(report) => {
                    match report.outcome {
                        CycleOutcome::Completed => summary.cycles_completed += 1,
                        CycleOutcome::Aborted { .. } => summary.cycles_aborted += 1,
                    }
                    summary.lines_emitted += report.lines_emitted;
                    self.transition(SchedulerState::Idle);
                }
                Err(e) => {
                    error!(error = %e, "Stopping scheduler after unrecoverable error");
                    self.transition(SchedulerState::Stopped);
                    return Err(e);
                }
            }
        }

        summary.final_watermark = self.checkpoint.watermark();
        self.transition(SchedulerState::Stopped);
        info!(
            cycles_completed = summary.cycles_completed,
            cycles_aborted = summary.cycles_aborted,
            lines_emitted = summary.lines_emitted,
            watermark = summary.final_watermark,
            "Scheduler stopped"
        );
        Ok(summary)
    }

    /// Run on a dedicated task
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = self.shutdown.clone();
        let state = self.subscribe();
        let task = tokio::spawn(self.run());
        SchedulerHandle {
            shutdown,
            state,
            task,
        }
    }
}

/// Handle to a spawned scheduler
pub struct SchedulerHandle {
    shutdown: SharedShutdown,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<Result<SchedulerSummary, HarvestError>>,
}

impl SchedulerHandle {
    /// Current scheduler state
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Request a stop and wait for the in-flight cycle, if any, to finish
    pub async fn stop(self) -> Result<SchedulerSummary, HarvestError> {
        self.shutdown.request_shutdown();
        self.join().await
    }

    /// Wait for the scheduler to end on its own
    pub async fn join(self) -> Result<SchedulerSummary, HarvestError> {
        self.task
            .await
            .map_err(|e| HarvestError::Task(e.to_string()))?
    }
}
