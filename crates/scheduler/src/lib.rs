pub mod admission;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod load;
pub mod manager;
pub mod metrics;
pub mod queue;
pub mod task;
pub mod types;

pub use admission::{AdmissionController, Refusal};
pub use config::{ConfigPatch, LoadSourceKind, SchedulerConfig};
pub use error::SchedulerError;
pub use events::{EventBus, SchedulerEvent};
pub use load::{LoadSample, LoadSource, SyntheticLoad, SystemLoad};
pub use manager::{ExecutionManager, StopReport};
pub use types::{
    ExecutionResult, Fingerprint, Priority, PriorityWeights, QueueStatus, SystemMetrics, TaskId,
    TaskState, TickReport,
};
