use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradebot_core::Signal;
use uuid::Uuid;

use crate::error::SchedulerError;

/// Process-unique task identifier, assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Hash of a strategy name plus the most recent payload window.
///
/// Equal fingerprints mean the same strategy over the same recent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Task priority. Mapped to a numeric weight through [`PriorityWeights`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl FromStr for Priority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(SchedulerError::InvalidPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

/// Numeric heap weight per priority level. Higher weight is dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityWeights {
    #[serde(default = "default_high_weight")]
    pub high: u32,
    #[serde(default = "default_medium_weight")]
    pub medium: u32,
    #[serde(default = "default_low_weight")]
    pub low: u32,
}

fn default_high_weight() -> u32 { 3 }
fn default_medium_weight() -> u32 { 2 }
fn default_low_weight() -> u32 { 1 }

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            high: default_high_weight(),
            medium: default_medium_weight(),
            low: default_low_weight(),
        }
    }
}

impl PriorityWeights {
    pub fn weight_of(&self, priority: Priority) -> u32 {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// Where a live task currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Active,
}

/// Terminal outcome of a task, emitted exactly once per task.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub task_id: TaskId,
    pub strategy_name: String,
    pub signals: Vec<Signal>,
    pub execution_time_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    /// Strategy invocations made for this task (0 when served from cache).
    pub attempts: u32,
    pub from_cache: bool,
    pub completed_at: DateTime<Utc>,
}

/// Point-in-time scheduler and load statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_tasks: usize,
    pub queued_tasks: usize,
    /// Rolling mean over the recent execution history.
    pub avg_execution_ms: f64,
    /// Terminal results per second over the last sampling window.
    pub throughput: f64,
    /// Cache hit ratio over the last sampling window.
    pub cache_hit_ratio: f64,
    pub avg_wait_ms: f64,
    pub total_submitted: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    pub total_rejected: u64,
    pub total_cache_hits: u64,
    pub total_cache_misses: u64,
    pub sampled_at: DateTime<Utc>,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            active_tasks: 0,
            queued_tasks: 0,
            avg_execution_ms: 0.0,
            throughput: 0.0,
            cache_hit_ratio: 0.0,
            avg_wait_ms: 0.0,
            total_submitted: 0,
            total_succeeded: 0,
            total_failed: 0,
            total_retried: 0,
            total_rejected: 0,
            total_cache_hits: 0,
            total_cache_misses: 0,
            sampled_at: Utc::now(),
        }
    }
}

/// Live queue occupancy, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueueStatus {
    pub queued_count: usize,
    pub active_count: usize,
    pub max_concurrent: usize,
    pub avg_wait_ms: f64,
}

/// What a single scheduling tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// True when admission was refused and nothing was dequeued.
    pub skipped: bool,
    /// Tasks handed to the strategy, in heap-extraction order.
    pub dispatched: Vec<TaskId>,
    /// Tasks completed straight from the result cache.
    pub cache_hits: Vec<TaskId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" medium ".parse::<Priority>().unwrap(), Priority::Medium);
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidPriority(ref p) if p == "urgent"));
    }

    #[test]
    fn default_weights_order_priorities() {
        let w = PriorityWeights::default();
        assert!(w.weight_of(Priority::High) > w.weight_of(Priority::Medium));
        assert!(w.weight_of(Priority::Medium) > w.weight_of(Priority::Low));
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn fingerprint_displays_as_hex() {
        assert_eq!(Fingerprint(255).to_string(), "00000000000000ff");
    }
}
