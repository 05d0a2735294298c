use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::PriorityWeights;

/// Which load source the admission controller samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSourceKind {
    /// Deterministic estimate derived from the active-task count.
    Synthetic,
    /// Real CPU and memory sampled from the OS.
    System,
}

/// Full scheduler configuration, typically parsed from `scheduler.toml`.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hard ceiling on concurrently active tasks.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Interval between scheduling ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Per-attempt bound on a strategy call.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Admission requires observed CPU% strictly below this.
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// Admission requires observed memory% strictly below this.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    #[serde(default)]
    pub priority_weights: PriorityWeights,

    /// Tasks dequeued per tick, before concurrency and queue-length caps.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Widen or narrow `batch_size` based on recent execution times.
    #[serde(default)]
    pub adaptive_batching: bool,

    /// Mean execution below this widens the adaptive batch.
    #[serde(default = "default_fast_execution_ms")]
    pub fast_execution_ms: u64,

    /// Mean execution above this narrows the adaptive batch.
    #[serde(default = "default_slow_execution_ms")]
    pub slow_execution_ms: u64,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    #[serde(default = "default_true")]
    pub dedup_enabled: bool,

    /// Number of most recent bars hashed into a fingerprint.
    #[serde(default = "default_fingerprint_window")]
    pub fingerprint_window: usize,

    /// Submissions beyond this many queued tasks are rejected.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    /// How long `stop()` waits for active tasks to drain.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Upper bound accepted for a task's `max_retries`.
    #[serde(default = "default_max_retries_limit")]
    pub max_retries_limit: u32,

    /// Executions kept for the rolling average.
    #[serde(default = "default_execution_history")]
    pub execution_history: usize,

    #[serde(default = "default_load_source")]
    pub load_source: LoadSourceKind,
}

fn default_max_concurrent_tasks() -> usize { 3 }
fn default_tick_interval_ms() -> u64 { 1_000 }
fn default_task_timeout_ms() -> u64 { 30_000 }
fn default_cpu_threshold() -> f64 { 80.0 }
fn default_memory_threshold() -> f64 { 85.0 }
fn default_batch_size() -> usize { 2 }
fn default_fast_execution_ms() -> u64 { 100 }
fn default_slow_execution_ms() -> u64 { 5_000 }
fn default_true() -> bool { true }
fn default_cache_ttl_ms() -> u64 { 60_000 }
fn default_cache_max_entries() -> usize { 1_024 }
fn default_fingerprint_window() -> usize { 10 }
fn default_max_queue_size() -> usize { 1_000 }
fn default_metrics_interval_ms() -> u64 { 5_000 }
fn default_shutdown_grace_ms() -> u64 { 10_000 }
fn default_max_retries_limit() -> u32 { 10 }
fn default_execution_history() -> usize { 100 }
fn default_load_source() -> LoadSourceKind { LoadSourceKind::Synthetic }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            tick_interval_ms: default_tick_interval_ms(),
            task_timeout_ms: default_task_timeout_ms(),
            cpu_threshold: default_cpu_threshold(),
            memory_threshold: default_memory_threshold(),
            priority_weights: PriorityWeights::default(),
            batch_size: default_batch_size(),
            adaptive_batching: false,
            fast_execution_ms: default_fast_execution_ms(),
            slow_execution_ms: default_slow_execution_ms(),
            cache_enabled: true,
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            dedup_enabled: true,
            fingerprint_window: default_fingerprint_window(),
            max_queue_size: default_max_queue_size(),
            metrics_interval_ms: default_metrics_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            max_retries_limit: default_max_retries_limit(),
            execution_history: default_execution_history(),
            load_source: default_load_source(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn fast_execution(&self) -> Duration {
        Duration::from_millis(self.fast_execution_ms)
    }

    pub fn slow_execution(&self) -> Duration {
        Duration::from_millis(self.slow_execution_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config:");
        tracing::info!(
            "  concurrency: max={}, batch={} (adaptive={})",
            self.max_concurrent_tasks,
            self.batch_size,
            self.adaptive_batching
        );
        tracing::info!(
            "  timing:      tick={}ms, timeout={}ms, metrics={}ms",
            self.tick_interval_ms,
            self.task_timeout_ms,
            self.metrics_interval_ms
        );
        tracing::info!(
            "  admission:   cpu<{}%, mem<{}%, load_source={:?}",
            self.cpu_threshold,
            self.memory_threshold,
            self.load_source
        );
        tracing::info!(
            "  dedup/cache: dedup={}, cache={} (ttl={}ms, max={}), window={}",
            self.dedup_enabled,
            self.cache_enabled,
            self.cache_ttl_ms,
            self.cache_max_entries,
            self.fingerprint_window
        );
        tracing::info!("  queue:       max_size={}", self.max_queue_size);
    }
}

impl std::str::FromStr for LoadSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(LoadSourceKind::Synthetic),
            "system" => Ok(LoadSourceKind::System),
            other => Err(format!("unknown load source '{other}'")),
        }
    }
}
