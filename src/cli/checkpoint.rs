//! Checkpoint inspection and reset

use super::CliError;
use crate::harvester::HarvesterConfig;
use crate::resume::CheckpointStore;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Checkpoint subcommand
#[derive(Debug, Args)]
pub struct CheckpointCommand {
    #[command(subcommand)]
    action: CheckpointAction,
}

/// Checkpoint actions
#[derive(Debug, clap::Subcommand)]
enum CheckpointAction {
    /// Print the stored watermark and cursors as JSON
    Show(CheckpointLocation),
    /// Delete the stored checkpoint so the next run starts from now
    Reset(CheckpointLocation),
}

/// Where the checkpoint lives: explicit path, or derived from the source
#[derive(Debug, Args)]
pub struct CheckpointLocation {
    /// Source instance identity
    #[arg(long, env = "LOG_HARVESTER_INSTANCE", required_unless_present = "checkpoint_path")]
    instance: Option<String>,

    /// Log-name filter
    #[arg(long = "log-file", env = "LOG_HARVESTER_LOG_FILE", required_unless_present = "checkpoint_path")]
    log_file: Option<String>,

    /// Checkpoint file
    #[arg(long, env = "LOG_HARVESTER_CHECKPOINT_PATH")]
    checkpoint_path: Option<PathBuf>,
}

impl CheckpointLocation {
    fn resolve(&self) -> Result<PathBuf, CliError> {
        if let Some(path) = &self.checkpoint_path {
            return Ok(path.clone());
        }
        match (&self.instance, &self.log_file) {
            (Some(instance), Some(log_file)) => {
                Ok(HarvesterConfig::new(instance, log_file).checkpoint_path())
            }
            _ => Err(CliError::InvalidArgument(
                "either --checkpoint-path or both --instance and --log-file are required"
                    .to_string(),
            )),
        }
    }
}

impl CheckpointCommand {
    /// Execute the checkpoint command
    pub fn execute(&self) -> Result<()> {
        match &self.action {
            CheckpointAction::Show(location) => Self::execute_show(location),
            CheckpointAction::Reset(location) => Self::execute_reset(location),
        }
    }

    fn execute_show(location: &CheckpointLocation) -> Result<()> {
        let store = CheckpointStore::new(location.resolve()?);
        let exists = store.path().exists();
        let checkpoint = store.load();

        let report = json!({
            "path": store.path().display().to_string(),
            "exists": exists,
            "watermark": checkpoint.watermark(),
            "cursors": checkpoint.cursors(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize checkpoint")?
        );
        Ok(())
    }

    fn execute_reset(location: &CheckpointLocation) -> Result<()> {
        let store = CheckpointStore::new(location.resolve()?);
        let removed = store
            .remove()
            .with_context(|| format!("Failed to remove {}", store.path().display()))?;
        if removed {
            info!(path = %store.path().display(), "Checkpoint removed");
        } else {
            info!(path = %store.path().display(), "No checkpoint to remove");
        }
        Ok(())
    }
}
