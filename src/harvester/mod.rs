//! Harvest orchestration
//!
//! # Overview
//!
//! 1. **Configuration**: describe the source with [`config::HarvesterConfig`]
//! 2. **Cycle**: [`cycle::FetchCycleEngine`] lists candidate files, drains every
//!    pending chunk, advances cursors and the watermark, and commits the
//!    checkpoint whatever the outcome
//! 3. **Scheduling**: [`scheduler::Scheduler`] runs one cycle per tick on a
//!    single task until a stop is requested
//!
//! # Error Handling
//!
//! Errors are categorized by type:
//! - Transient source errors end the cycle early; progress is committed and
//!   the next tick retries from it
//! - Key derivation errors skip one file
//! - Checkpoint write errors, sink errors and source configuration errors
//!   stop the scheduler

pub mod config;
pub mod cycle;
pub mod scheduler;

pub use config::HarvesterConfig;
pub use cycle::{CycleOutcome, CycleReport, FetchCycleEngine};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState, SchedulerSummary};

use crate::fetcher::SourceError;
use crate::identifier::KeyDerivationError;
use crate::output::SinkError;
use crate::resume::StoreError;

/// Harvest errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Log source error
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// File name without identity key
    #[error("key derivation error: {0}")]
    KeyDerivation(#[from] KeyDerivationError),

    /// Checkpoint could not be committed
    #[error("checkpoint store error: {0}")]
    Store(#[from] StoreError),

    /// Downstream sink failed
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Scheduler task failed
    #[error("scheduler task error: {0}")]
    Task(String),
}

impl HarvestError {
    /// Whether the scheduler may continue with the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, HarvestError::Source(e) if e.is_transient())
    }
}
