//! # Log Harvester Library
//!
//! Incrementally harvests append-only remote log files on a fixed schedule and
//! forwards every newly appended line, in order, to a downstream queue. Progress
//! is checkpointed durably so restarts neither re-emit committed data nor lose
//! it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use log_harvester::fetcher::DirectoryLogSource;
//! use log_harvester::harvester::{FetchCycleEngine, HarvesterConfig, Scheduler};
//! use log_harvester::output::{ChannelSink, PlainCodec};
//! use log_harvester::resume::CheckpointStore;
//! use log_harvester::shutdown::ShutdownCoordinator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarvesterConfig::new("db-1", "postgresql.log");
//! let (sink, mut events) = ChannelSink::bounded(1024);
//!
//! let engine = FetchCycleEngine::new(
//!     config.clone(),
//!     Arc::new(DirectoryLogSource::new("/var/log/db-1")),
//!     Arc::new(PlainCodec),
//!     Arc::new(sink),
//!     CheckpointStore::new(config.checkpoint_path()),
//! );
//!
//! let shutdown = ShutdownCoordinator::shared();
//! let handle = Scheduler::new(engine, shutdown).spawn();
//!
//! if let Some(event) = events.recv().await {
//!     println!("{}", event.message);
//! }
//! let summary = handle.stop().await?;
//! println!("watermark: {}", summary.final_watermark);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - File identity keys derived from rotated file names
//! - [`resume`] - Checkpoint model and durable store
//! - [`fetcher`] - Log source capability and the local directory source
//! - [`output`] - Line codecs and event sinks
//! - [`harvester`] - Fetch cycle engine, scheduler and configuration
//! - [`shutdown`] - Cooperative stop signal
//! - [`metrics`] - Prometheus metrics

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CLI command implementations
pub mod cli;

/// Log source adapters
pub mod fetcher;

/// Fetch cycle engine and scheduling
pub mod harvester;

/// Log file identity keys
pub mod identifier;

/// Harvest metrics
pub mod metrics;

/// Line codecs and event sinks
pub mod output;

/// Checkpoint persistence
pub mod resume;

/// Graceful shutdown coordination
pub mod shutdown;

pub use identifier::FileKey;
pub use resume::{Checkpoint, CheckpointStore};

/// A log file offered by the source for the current cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileCandidate {
    /// File name as known to the source
    pub name: String,
    /// Last modification time (Unix timestamp in milliseconds)
    pub last_written: i64,
    /// File size in bytes, informational only
    pub size: u64,
}

/// One bounded read from a log file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogChunk {
    /// Raw lines, each normally ending in a newline
    pub lines: Vec<String>,
    /// Cursor to pass to the next read of the same file
    pub marker: String,
    /// Whether more data is available right now past `marker`
    pub more_pending: bool,
}

/// Event forwarded downstream for every harvested line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Time the line was harvested
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Decoded line content
    pub message: String,
    /// Source instance that produced the line
    pub source_instance: String,
    /// Log-name filter that selected the file
    pub log_file: String,
    /// Concrete file the line was read from
    pub file_name: String,
    /// Codec-extracted and configured fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}
