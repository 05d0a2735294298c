//! Pluggable CPU/memory load sources for admission control.
//!
//! Scheduling correctness never depends on which source is plugged in; a
//! wrong reading only delays or hastens admission.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use sysinfo::System;

use crate::config::LoadSourceKind;

/// One CPU/memory reading, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LoadSample {
    pub cpu_pct: f64,
    pub memory_pct: f64,
}

pub trait LoadSource: Send + Sync {
    /// Take a reading. `active` and `max_concurrent` describe the scheduler's
    /// own occupancy; OS-backed sources may ignore them.
    fn sample(&self, active: usize, max_concurrent: usize) -> LoadSample;

    fn name(&self) -> &str;
}

/// Deterministic estimate derived from scheduler occupancy.
///
/// cpu = 10 + 70 * utilisation, memory = 30 + 50 * utilisation, where
/// utilisation = active / max_concurrent clamped to [0, 1]. With the default
/// thresholds (80/85) this only refuses admission once every slot is taken,
/// where the concurrency ceiling refuses it anyway.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticLoad;

impl LoadSource for SyntheticLoad {
    fn sample(&self, active: usize, max_concurrent: usize) -> LoadSample {
        let utilisation = if max_concurrent == 0 {
            1.0
        } else {
            (active as f64 / max_concurrent as f64).min(1.0)
        };
        LoadSample {
            cpu_pct: 10.0 + 70.0 * utilisation,
            memory_pct: 30.0 + 50.0 * utilisation,
        }
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Real host CPU and memory usage via `sysinfo`.
///
/// CPU usage is computed between consecutive refreshes, so the first reading
/// after construction is typically 0.
pub struct SystemLoad {
    system: Mutex<System>,
}

impl SystemLoad {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSource for SystemLoad {
    fn sample(&self, _active: usize, _max_concurrent: usize) -> LoadSample {
        let mut sys = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        let total = sys.total_memory();
        let memory_pct = if total == 0 {
            0.0
        } else {
            sys.used_memory() as f64 / total as f64 * 100.0
        };
        LoadSample {
            cpu_pct: sys.global_cpu_usage() as f64,
            memory_pct,
        }
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// Build the load source named by the config.
pub fn from_kind(kind: LoadSourceKind) -> Box<dyn LoadSource> {
    match kind {
        LoadSourceKind::Synthetic => Box::new(SyntheticLoad),
        LoadSourceKind::System => Box::new(SystemLoad::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_idle_and_full() {
        let idle = SyntheticLoad.sample(0, 4);
        assert_eq!(idle, LoadSample { cpu_pct: 10.0, memory_pct: 30.0 });

        let full = SyntheticLoad.sample(4, 4);
        assert_eq!(full, LoadSample { cpu_pct: 80.0, memory_pct: 80.0 });
    }

    #[test]
    fn synthetic_clamps_over_capacity() {
        assert_eq!(SyntheticLoad.sample(10, 2), SyntheticLoad.sample(2, 2));
        assert_eq!(SyntheticLoad.sample(0, 0), SyntheticLoad.sample(1, 1));
    }

    #[test]
    fn system_load_is_in_range() {
        let source = SystemLoad::new();
        let sample = source.sample(0, 1);
        assert!((0.0..=100.0).contains(&sample.memory_pct));
        assert!(sample.cpu_pct >= 0.0);
        assert_eq!(source.name(), "system");
    }

    #[test]
    fn from_kind_picks_source() {
        assert_eq!(from_kind(LoadSourceKind::Synthetic).name(), "synthetic");
        assert_eq!(from_kind(LoadSourceKind::System).name(), "system");
    }
}
