//! CLI command implementations

pub mod checkpoint;
pub mod error;
pub mod run;

pub use checkpoint::CheckpointCommand;
pub use error::CliError;
pub use run::RunArgs;

use clap::{Parser, Subcommand};

/// Log Harvester CLI
#[derive(Parser, Debug)]
#[command(name = "log-harvester")]
#[command(about = "Incrementally harvest append-only log files with durable checkpoints", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll a log source and emit new lines as JSON on stdout
    Run(RunArgs),
    /// Inspect or reset checkpoint state
    Checkpoint(CheckpointCommand),
}
