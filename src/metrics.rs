// Run metrics module
//
// Lightweight counters for one orchestrated run, logged when the run ends

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Run-level metrics
///
/// Counters are atomic so a shared reference is enough to record into them.
#[derive(Debug)]
pub struct RunMetrics {
    /// Stages that returned an output
    pub stages_completed: AtomicUsize,

    /// Stages whose error was caught at the stage boundary
    pub stages_failed: AtomicUsize,

    /// Enabled-or-not stages that were never attempted
    pub stages_skipped: AtomicUsize,

    /// Pipeline specs evaluated successfully
    pub pipelines_evaluated: AtomicUsize,

    /// Total time spent inside stages in milliseconds
    pub total_stage_time_ms: AtomicU64,

    stage_times: Mutex<Vec<(&'static str, Duration)>>,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            stages_completed: AtomicUsize::new(0),
            stages_failed: AtomicUsize::new(0),
            stages_skipped: AtomicUsize::new(0),
            pipelines_evaluated: AtomicUsize::new(0),
            total_stage_time_ms: AtomicU64::new(0),
            stage_times: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_stage_completed(&self) {
        self.stages_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stage_failed(&self) {
        self.stages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stage_skipped(&self) {
        self.stages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pipelines_evaluated(&self, count: usize) {
        self.pipelines_evaluated.fetch_add(count, Ordering::Relaxed);
    }

    /// Record how long a stage ran
    pub fn record_stage_time(&self, stage: &'static str, duration: Duration) {
        self.total_stage_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        if let Ok(mut times) = self.stage_times.lock() {
            times.push((stage, duration));
        }
    }

    /// Recorded stage durations in execution order
    pub fn stage_times(&self) -> Vec<(&'static str, Duration)> {
        self.stage_times
            .lock()
            .map(|times| times.clone())
            .unwrap_or_default()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Stages: {} completed, {} failed, {} skipped",
            self.stages_completed.load(Ordering::Relaxed),
            self.stages_failed.load(Ordering::Relaxed),
            self.stages_skipped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Pipelines evaluated: {}",
            self.pipelines_evaluated.load(Ordering::Relaxed)
        );
        for (stage, duration) in self.stage_times() {
            tracing::info!("  {}: {:.2}s", stage, duration.as_secs_f64());
        }
        tracing::info!(
            "Total stage time: {:.2}s",
            self.total_stage_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
