use serde::Deserialize;

use crate::error::SchedulerError;
use crate::types::PriorityWeights;

use super::types::{LoadSourceKind, SchedulerConfig};

/// A partial config for hot reload. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub max_concurrent_tasks: Option<usize>,
    pub tick_interval_ms: Option<u64>,
    pub task_timeout_ms: Option<u64>,
    pub cpu_threshold: Option<f64>,
    pub memory_threshold: Option<f64>,
    pub priority_weights: Option<PriorityWeights>,
    pub batch_size: Option<usize>,
    pub adaptive_batching: Option<bool>,
    pub fast_execution_ms: Option<u64>,
    pub slow_execution_ms: Option<u64>,
    pub cache_enabled: Option<bool>,
    pub cache_ttl_ms: Option<u64>,
    pub cache_max_entries: Option<usize>,
    pub dedup_enabled: Option<bool>,
    pub fingerprint_window: Option<usize>,
    pub max_queue_size: Option<usize>,
    pub metrics_interval_ms: Option<u64>,
    pub shutdown_grace_ms: Option<u64>,
    pub max_retries_limit: Option<u32>,
    pub execution_history: Option<usize>,
    pub load_source: Option<LoadSourceKind>,
}

impl SchedulerConfig {
    /// Return a copy of `self` with `patch` applied, or an error if the
    /// result fails validation. `self` is never modified.
    pub fn merged(&self, patch: &ConfigPatch) -> Result<SchedulerConfig, SchedulerError> {
        let mut next = self.clone();
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = patch.$field { next.$field = v; })*
            };
        }
        take!(
            max_concurrent_tasks,
            tick_interval_ms,
            task_timeout_ms,
            cpu_threshold,
            memory_threshold,
            priority_weights,
            batch_size,
            adaptive_batching,
            fast_execution_ms,
            slow_execution_ms,
            cache_enabled,
            cache_ttl_ms,
            cache_max_entries,
            dedup_enabled,
            fingerprint_window,
            max_queue_size,
            metrics_interval_ms,
            shutdown_grace_ms,
            max_retries_limit,
            execution_history,
            load_source,
        );
        next.validate()?;
        Ok(next)
    }
}
