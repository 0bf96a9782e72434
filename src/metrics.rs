//! Harvest observability metrics
//!
//! Uses the `metrics` facade; metrics are no-ops until [`init_metrics`]
//! installs the Prometheus exporter.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, info};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls after a successful one are ignored.
///
/// # Errors
/// Returns an error if the exporter cannot be installed (e.g. the address is in use)
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(%existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "harvest_cycles_total",
        Unit::Count,
        "Polling cycles run, labelled by outcome"
    );
    describe_counter!(
        "harvest_lines_emitted_total",
        Unit::Count,
        "Log lines forwarded downstream"
    );
    describe_counter!(
        "harvest_chunks_fetched_total",
        Unit::Count,
        "Chunks fetched from the log source"
    );
    describe_counter!(
        "harvest_transient_errors_total",
        Unit::Count,
        "Cycles cut short by a transient source error"
    );
    describe_counter!(
        "harvest_skipped_files_total",
        Unit::Count,
        "Files skipped because no identity key could be derived"
    );
    describe_counter!(
        "checkpoint_saves_total",
        Unit::Count,
        "Checkpoint commits, labelled by result"
    );
    describe_histogram!(
        "harvest_cycle_duration_seconds",
        Unit::Seconds,
        "Wall time of one polling cycle"
    );
    describe_gauge!(
        "harvest_watermark_ms",
        Unit::Milliseconds,
        "Committed watermark"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}

/// Outcome label of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcomeLabel {
    /// All candidates drained
    Completed,
    /// Cut short by a transient source error
    Aborted,
    /// Ended with an error that stops the harvester
    Failed,
}

impl CycleOutcomeLabel {
    fn as_str(self) -> &'static str {
        match self {
            CycleOutcomeLabel::Completed => "completed",
            CycleOutcomeLabel::Aborted => "aborted",
            CycleOutcomeLabel::Failed => "failed",
        }
    }
}

/// Per-cycle metrics
pub struct CycleMetrics {
    source_instance: String,
    start_time: Instant,
}

impl CycleMetrics {
    /// Start tracking a cycle
    pub fn start(source_instance: impl Into<String>) -> Self {
        Self {
            source_instance: source_instance.into(),
            start_time: Instant::now(),
        }
    }

    /// Record one fetched chunk and the lines emitted from it
    pub fn record_chunk(&self, lines: usize) {
        counter!(
            "harvest_chunks_fetched_total",
            "source" => self.source_instance.clone(),
        )
        .increment(1);
        counter!(
            "harvest_lines_emitted_total",
            "source" => self.source_instance.clone(),
        )
        .increment(lines as u64);
    }

    /// Record a file skipped for lack of an identity key
    pub fn record_skipped_file(&self) {
        counter!(
            "harvest_skipped_files_total",
            "source" => self.source_instance.clone(),
        )
        .increment(1);
    }

    /// Record a transient source error
    pub fn record_transient_error(&self) {
        counter!(
            "harvest_transient_errors_total",
            "source" => self.source_instance.clone(),
        )
        .increment(1);
    }

    /// Record a checkpoint commit attempt
    pub fn record_checkpoint_save(&self, ok: bool, watermark: i64) {
        counter!(
            "checkpoint_saves_total",
            "source" => self.source_instance.clone(),
            "result" => if ok { "ok" } else { "error" },
        )
        .increment(1);
        if ok {
            gauge!(
                "harvest_watermark_ms",
                "source" => self.source_instance.clone(),
            )
            .set(watermark as f64);
        }
    }

    /// Record the end of the cycle
    pub fn finish(self, outcome: CycleOutcomeLabel) {
        let duration = self.start_time.elapsed();
        counter!(
            "harvest_cycles_total",
            "source" => self.source_instance.clone(),
            "outcome" => outcome.as_str(),
        )
        .increment(1);
        histogram!(
            "harvest_cycle_duration_seconds",
            "source" => self.source_instance.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            source_instance = %self.source_instance,
            outcome = outcome.as_str(),
            duration_ms = duration.as_millis(),
            "Cycle metrics recorded"
        );
    }
}
