use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::cache::ResultCache;
use crate::load::LoadSample;
use crate::queue::PriorityQueue;
use crate::types::SystemMetrics;

/// Execution timings and lifetime counters, owned by the scheduler state.
///
/// Sampling ([`ExecutionStats::snapshot`]) closes the current throughput and
/// cache-hit windows.
#[derive(Debug)]
pub struct ExecutionStats {
    history: VecDeque<Duration>,
    history_capacity: usize,
    /// Per-strategy (count, mean) used for advisory estimates.
    per_strategy: HashMap<String, (u64, Duration)>,
    window_completions: u64,
    window_started: Instant,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    pub rejected: u64,
}

impl ExecutionStats {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(history_capacity),
            history_capacity: history_capacity.max(1),
            per_strategy: HashMap::new(),
            window_completions: 0,
            window_started: Instant::now(),
            submitted: 0,
            succeeded: 0,
            failed: 0,
            retried: 0,
            rejected: 0,
        }
    }

    /// Record one strategy invocation's wall time.
    pub fn record_execution(&mut self, strategy: &str, duration: Duration) {
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(duration);

        let entry = self
            .per_strategy
            .entry(strategy.to_string())
            .or_insert((0, Duration::ZERO));
        entry.0 += 1;
        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let prev = entry.1.as_nanos() as f64;
        let cur = duration.as_nanos() as f64;
        entry.1 = Duration::from_nanos((prev + (cur - prev) / entry.0 as f64) as u64);
    }

    /// Record a terminal result for throughput accounting.
    pub fn record_terminal(&mut self, success: bool) {
        self.window_completions += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Mean over the retained execution history, if any.
    pub fn rolling_average(&self) -> Option<Duration> {
        if self.history.is_empty() {
            return None;
        }
        let total: Duration = self.history.iter().sum();
        Some(total / self.history.len() as u32)
    }

    /// Mean execution time seen for `strategy`, or zero if never run.
    pub fn estimate_for(&self, strategy: &str) -> Duration {
        self.per_strategy
            .get(strategy)
            .map(|(_, avg)| *avg)
            .unwrap_or_default()
    }

    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.history_capacity = capacity.max(1);
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
    }

    /// Build a metrics snapshot and start new throughput/cache windows.
    pub fn snapshot(
        &mut self,
        load: LoadSample,
        active: usize,
        queue: &PriorityQueue,
        cache: &mut ResultCache,
        now: Instant,
    ) -> SystemMetrics {
        let elapsed = now.saturating_duration_since(self.window_started).as_secs_f64();
        let throughput = if elapsed > 0.0 {
            self.window_completions as f64 / elapsed
        } else {
            0.0
        };
        self.window_completions = 0;
        self.window_started = now;

        SystemMetrics {
            cpu_usage: load.cpu_pct,
            memory_usage: load.memory_pct,
            active_tasks: active,
            queued_tasks: queue.len(),
            avg_execution_ms: self
                .rolling_average()
                .map(|d| d.as_secs_f64() * 1_000.0)
                .unwrap_or(0.0),
            throughput,
            cache_hit_ratio: cache.take_window_hit_ratio(),
            avg_wait_ms: queue.average_wait(now).as_secs_f64() * 1_000.0,
            total_submitted: self.submitted,
            total_succeeded: self.succeeded,
            total_failed: self.failed,
            total_retried: self.retried,
            total_rejected: self.rejected,
            total_cache_hits: cache.hits(),
            total_cache_misses: cache.misses(),
            sampled_at: Utc::now(),
        }
    }
}
