use thiserror::Error;

use crate::types::{Fingerprint, TaskId};

/// Errors surfaced synchronously by the scheduler.
///
/// Strategy failures are never reported through this type; they end up on
/// the task's [`ExecutionResult`](crate::types::ExecutionResult).
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("queue full: {capacity} tasks already queued")]
    QueueFull { capacity: usize },

    #[error("duplicate task: {fingerprint} is already owned by task {existing}")]
    Duplicate { fingerprint: Fingerprint, existing: TaskId },

    #[error("invalid priority '{0}', expected high, medium or low")]
    InvalidPriority(String),

    #[error("max retries {requested} exceeds limit {limit}")]
    InvalidRetries { requested: u32, limit: u32 },

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
