//! Scheduler configuration: TOML parsing, `SCHEDULER_*` env overrides,
//! validation, and partial patches for hot reload.

mod loading;
mod patch;
mod types;
mod validation;
#[cfg(test)]
mod tests;

pub use loading::load_dotenv;
pub use patch::ConfigPatch;
pub use types::{LoadSourceKind, SchedulerConfig};
