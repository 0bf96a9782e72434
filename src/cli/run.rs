//! Run command: poll a directory source and write events to stdout

use super::CliError;
use crate::fetcher::DirectoryLogSource;
use crate::harvester::config::{DEFAULT_MAX_LINES_PER_REQUEST, DEFAULT_POLLING_INTERVAL_SECS};
use crate::harvester::{FetchCycleEngine, HarvesterConfig, Scheduler, SchedulerSummary};
use crate::output::{CodecKind, JsonLinesSink};
use crate::resume::CheckpointStore;
use crate::shutdown::SharedShutdown;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Parse a `key=value` pair
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{s}' is not in key=value form"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("'{s}' has an empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding the log files
    #[arg(long, env = "LOG_HARVESTER_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Source instance identity attached to every event
    #[arg(long, env = "LOG_HARVESTER_INSTANCE")]
    pub instance: String,

    /// Only harvest files whose name contains this string
    #[arg(long = "log-file", env = "LOG_HARVESTER_LOG_FILE")]
    pub log_file: String,

    /// Seconds between polling cycles
    #[arg(long, env = "LOG_HARVESTER_INTERVAL", default_value_t = DEFAULT_POLLING_INTERVAL_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Checkpoint file (default: derived from instance and log file in $HOME)
    #[arg(long, env = "LOG_HARVESTER_CHECKPOINT_PATH")]
    pub checkpoint_path: Option<PathBuf>,

    /// Maximum lines requested per chunk
    #[arg(long, default_value_t = DEFAULT_MAX_LINES_PER_REQUEST,
          value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_lines: u32,

    /// Line codec
    #[arg(long, value_enum, default_value_t = CodecKind::Plain)]
    pub codec: CodecKind,

    /// Extra field added to every event (repeatable)
    #[arg(long = "add-field", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub add_fields: Vec<(String, String)>,

    /// Tag added to every event (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Run the first cycle at startup instead of after one interval
    #[arg(long, default_value_t = false)]
    pub run_immediately: bool,

    /// Address for the Prometheus scrape endpoint
    #[arg(long, env = "LOG_HARVESTER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl RunArgs {
    /// Build the harvester configuration
    pub fn to_config(&self) -> HarvesterConfig {
        let mut config = HarvesterConfig::new(&self.instance, &self.log_file)
            .with_polling_interval_secs(self.interval)
            .with_max_lines_per_request(self.max_lines)
            .with_run_immediately(self.run_immediately);
        if let Some(path) = &self.checkpoint_path {
            config = config.with_checkpoint_path(path);
        }
        for (key, value) in &self.add_fields {
            config = config.with_field(key, value);
        }
        for tag in &self.tags {
            config = config.with_tag(tag);
        }
        config
    }

    /// Execute the run command until shutdown
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<SchedulerSummary, CliError> {
        let config = self.to_config();
        config.validate().map_err(CliError::ConfigurationError)?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        if !self.source_dir.is_dir() {
            warn!(
                source_dir = %self.source_dir.display(),
                "Source directory does not exist yet; cycles will retry"
            );
        }

        let store = CheckpointStore::new(config.checkpoint_path());
        info!(
            source_instance = %config.source_instance,
            log_file = %config.log_file_filter,
            checkpoint = %store.path().display(),
            "Starting harvester"
        );

        let engine = FetchCycleEngine::new(
            config,
            Arc::new(DirectoryLogSource::new(&self.source_dir)),
            self.codec.build(),
            Arc::new(JsonLinesSink::stdout()),
            store,
        );

        let summary = Scheduler::new(engine, shutdown).run().await?;
        Ok(summary)
    }
}
