//! Harvester configuration and defaults

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between polling cycles.
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 600;

/// Default maximum lines requested per chunk.
pub const DEFAULT_MAX_LINES_PER_REQUEST: u32 = 10_000;

/// Largest chunk size a source is asked for.
pub const MAX_LINES_PER_REQUEST_LIMIT: u32 = 10_000;

/// File name prefix of derived checkpoint paths
const CHECKPOINT_FILE_PREFIX: &str = ".log-harvester-";

/// Harvester configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvesterConfig {
    /// Identity of the source instance (attached to every event)
    pub source_instance: String,
    /// Substring a file name must contain to be harvested
    pub log_file_filter: String,
    /// Seconds between polling cycles
    pub polling_interval_secs: u64,
    /// Explicit checkpoint location; derived from the source when `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<PathBuf>,
    /// Maximum lines requested per chunk
    pub max_lines_per_request: u32,
    /// Run the first cycle before the first sleep
    #[serde(default)]
    pub run_immediately: bool,
    /// Static fields added to every event
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add_fields: BTreeMap<String, String>,
    /// Tags added to every event
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl HarvesterConfig {
    /// Create a configuration with defaults for everything but the source
    pub fn new(source_instance: impl Into<String>, log_file_filter: impl Into<String>) -> Self {
        Self {
            source_instance: source_instance.into(),
            log_file_filter: log_file_filter.into(),
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            checkpoint_path: None,
            max_lines_per_request: DEFAULT_MAX_LINES_PER_REQUEST,
            run_immediately: false,
            add_fields: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    /// Set the polling interval in seconds
    pub fn with_polling_interval_secs(mut self, secs: u64) -> Self {
        self.polling_interval_secs = secs;
        self
    }

    /// Set an explicit checkpoint path
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Set the maximum lines per chunk request
    pub fn with_max_lines_per_request(mut self, max_lines: u32) -> Self {
        self.max_lines_per_request = max_lines;
        self
    }

    /// Run the first cycle without waiting a full interval
    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    /// Add a static field to every event
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_fields.insert(key.into(), value.into());
        self
    }

    /// Add a tag to every event
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Polling interval as a [`Duration`]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Resolve the checkpoint location
    ///
    /// Defaults to `$HOME/.log-harvester-<sha256(instance + "+" + filter)>`,
    /// or the current directory when no home directory is known.
    pub fn checkpoint_path(&self) -> PathBuf {
        if let Some(path) = &self.checkpoint_path {
            return path.clone();
        }
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join(default_checkpoint_file_name(
            &self.source_instance,
            &self.log_file_filter,
        ))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.source_instance.trim().is_empty() {
            return Err("source instance cannot be empty".to_string());
        }
        if self.log_file_filter.trim().is_empty() {
            return Err("log file filter cannot be empty".to_string());
        }
        if self.polling_interval_secs == 0 {
            return Err("polling interval must be at least 1 second".to_string());
        }
        if self.max_lines_per_request == 0 || self.max_lines_per_request > MAX_LINES_PER_REQUEST_LIMIT
        {
            return Err(format!(
                "max lines per request must be between 1 and {MAX_LINES_PER_REQUEST_LIMIT}, got {}",
                self.max_lines_per_request
            ));
        }
        Ok(())
    }
}

/// Checkpoint file name derived from the source identity and filter
pub fn default_checkpoint_file_name(source_instance: &str, log_file_filter: &str) -> String {
    let digest = Sha256::digest(format!("{source_instance}+{log_file_filter}").as_bytes());
    format!("{CHECKPOINT_FILE_PREFIX}{}", hex::encode(digest))
}
