//! Execution manager: owns the queue, dedup index, result cache and
//! admission policy, and drives strategy tasks to a terminal outcome.
//!
//! Split into focused submodules:
//! - `core`: manager struct, submission, cancellation, config reload, observability
//! - `execution`: the scheduling tick, per-task execution and outcome routing
//! - `lifecycle`: start/stop, the tick and metrics loops, shutdown drain
//! - `state`: the lock-protected shared state

mod core;
mod execution;
mod lifecycle;
mod state;

pub use self::core::ExecutionManager;
pub use self::lifecycle::StopReport;
