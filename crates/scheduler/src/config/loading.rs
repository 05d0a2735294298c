use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::error::SchedulerError;

use super::types::SchedulerConfig;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

impl SchedulerConfig {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Apply `SCHEDULER_*` environment variable overrides.
    ///
    /// Convention: `SCHEDULER_<FIELD>` overrides the field of the same name,
    /// and `SCHEDULER_PRIORITY_WEIGHT_<LEVEL>` overrides one priority weight.
    /// Examples:
    /// - `SCHEDULER_MAX_CONCURRENT_TASKS` -> `max_concurrent_tasks`
    /// - `SCHEDULER_CACHE_TTL_MS` -> `cache_ttl_ms`
    /// - `SCHEDULER_PRIORITY_WEIGHT_HIGH` -> `priority_weights.high`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparsable values are
    /// logged and ignored.
    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = &lookup;
        set(lookup, "SCHEDULER_MAX_CONCURRENT_TASKS", &mut self.max_concurrent_tasks);
        set(lookup, "SCHEDULER_TICK_INTERVAL_MS", &mut self.tick_interval_ms);
        set(lookup, "SCHEDULER_TASK_TIMEOUT_MS", &mut self.task_timeout_ms);
        set(lookup, "SCHEDULER_CPU_THRESHOLD", &mut self.cpu_threshold);
        set(lookup, "SCHEDULER_MEMORY_THRESHOLD", &mut self.memory_threshold);
        set(lookup, "SCHEDULER_PRIORITY_WEIGHT_HIGH", &mut self.priority_weights.high);
        set(lookup, "SCHEDULER_PRIORITY_WEIGHT_MEDIUM", &mut self.priority_weights.medium);
        set(lookup, "SCHEDULER_PRIORITY_WEIGHT_LOW", &mut self.priority_weights.low);
        set(lookup, "SCHEDULER_BATCH_SIZE", &mut self.batch_size);
        set(lookup, "SCHEDULER_ADAPTIVE_BATCHING", &mut self.adaptive_batching);
        set(lookup, "SCHEDULER_FAST_EXECUTION_MS", &mut self.fast_execution_ms);
        set(lookup, "SCHEDULER_SLOW_EXECUTION_MS", &mut self.slow_execution_ms);
        set(lookup, "SCHEDULER_CACHE_ENABLED", &mut self.cache_enabled);
        set(lookup, "SCHEDULER_CACHE_TTL_MS", &mut self.cache_ttl_ms);
        set(lookup, "SCHEDULER_CACHE_MAX_ENTRIES", &mut self.cache_max_entries);
        set(lookup, "SCHEDULER_DEDUP_ENABLED", &mut self.dedup_enabled);
        set(lookup, "SCHEDULER_FINGERPRINT_WINDOW", &mut self.fingerprint_window);
        set(lookup, "SCHEDULER_MAX_QUEUE_SIZE", &mut self.max_queue_size);
        set(lookup, "SCHEDULER_METRICS_INTERVAL_MS", &mut self.metrics_interval_ms);
        set(lookup, "SCHEDULER_SHUTDOWN_GRACE_MS", &mut self.shutdown_grace_ms);
        set(lookup, "SCHEDULER_MAX_RETRIES_LIMIT", &mut self.max_retries_limit);
        set(lookup, "SCHEDULER_EXECUTION_HISTORY", &mut self.execution_history);
        set(lookup, "SCHEDULER_LOAD_SOURCE", &mut self.load_source);
    }
}

fn set<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!(key, value = %raw, "ignoring unparsable config override"),
        }
    }
}
