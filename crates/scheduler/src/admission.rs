//! Admission control: whether a tick may start work, and how much.

use std::fmt;
use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::load::LoadSample;

/// Why a tick was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Refusal {
    CpuSaturated { observed: f64, threshold: f64 },
    MemorySaturated { observed: f64, threshold: f64 },
    ConcurrencyCeiling { active: usize, max: usize },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::CpuSaturated { observed, threshold } => {
                write!(f, "cpu {observed:.1}% >= {threshold:.1}%")
            }
            Refusal::MemorySaturated { observed, threshold } => {
                write!(f, "memory {observed:.1}% >= {threshold:.1}%")
            }
            Refusal::ConcurrencyCeiling { active, max } => {
                write!(f, "{active}/{max} tasks active")
            }
        }
    }
}

/// Admission policy, built from a config snapshot at the start of each tick.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    cpu_threshold: f64,
    memory_threshold: f64,
    max_concurrent: usize,
    batch_size: usize,
    adaptive: bool,
    fast_execution: Duration,
    slow_execution: Duration,
}

impl AdmissionController {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            cpu_threshold: config.cpu_threshold,
            memory_threshold: config.memory_threshold,
            max_concurrent: config.max_concurrent_tasks,
            batch_size: config.batch_size,
            adaptive: config.adaptive_batching,
            fast_execution: config.fast_execution(),
            slow_execution: config.slow_execution(),
        }
    }

    /// Admission requires CPU and memory below their thresholds and a free
    /// concurrency slot, all at once.
    pub fn check(&self, load: LoadSample, active: usize) -> Result<(), Refusal> {
        if load.cpu_pct >= self.cpu_threshold {
            return Err(Refusal::CpuSaturated {
                observed: load.cpu_pct,
                threshold: self.cpu_threshold,
            });
        }
        if load.memory_pct >= self.memory_threshold {
            return Err(Refusal::MemorySaturated {
                observed: load.memory_pct,
                threshold: self.memory_threshold,
            });
        }
        if active >= self.max_concurrent {
            return Err(Refusal::ConcurrencyCeiling {
                active,
                max: self.max_concurrent,
            });
        }
        Ok(())
    }

    pub fn can_admit_more(&self, load: LoadSample, active: usize) -> bool {
        self.check(load, active).is_ok()
    }

    /// Configured batch size, widened or narrowed when adaptive batching is
    /// on and a mean execution time is known. Always in [1, max_concurrent].
    pub fn effective_batch_size(&self, avg_execution: Option<Duration>) -> usize {
        let base = self.batch_size;
        let sized = match avg_execution {
            Some(avg) if self.adaptive && !avg.is_zero() && avg < self.fast_execution => {
                base.saturating_mul(2)
            }
            Some(avg) if self.adaptive && avg > self.slow_execution => base / 2,
            _ => base,
        };
        sized.clamp(1, self.max_concurrent.max(1))
    }

    /// How many tasks this tick may dequeue:
    /// `min(free slots, effective batch size, queue length)`.
    pub fn batch_size(&self, queue_len: usize, active: usize, avg_execution: Option<Duration>) -> usize {
        let available = self.max_concurrent.saturating_sub(active);
        available
            .min(self.effective_batch_size(avg_execution))
            .min(queue_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(adaptive: bool) -> AdmissionController {
        AdmissionController::from_config(&SchedulerConfig {
            max_concurrent_tasks: 4,
            batch_size: 2,
            adaptive_batching: adaptive,
            fast_execution_ms: 100,
            slow_execution_ms: 1_000,
            ..Default::default()
        })
    }

    fn calm() -> LoadSample {
        LoadSample { cpu_pct: 20.0, memory_pct: 40.0 }
    }

    #[test]
    fn admits_under_all_limits() {
        assert!(controller(false).can_admit_more(calm(), 3));
    }

    #[test]
    fn refuses_at_concurrency_ceiling() {
        let c = controller(false);
        assert_eq!(
            c.check(calm(), 4),
            Err(Refusal::ConcurrencyCeiling { active: 4, max: 4 })
        );
    }

    #[test]
    fn refuses_on_cpu_or_memory() {
        let c = controller(false);
        let hot = LoadSample { cpu_pct: 80.0, memory_pct: 10.0 };
        assert!(matches!(c.check(hot, 0), Err(Refusal::CpuSaturated { .. })));

        let full = LoadSample { cpu_pct: 10.0, memory_pct: 95.0 };
        assert!(matches!(c.check(full, 0), Err(Refusal::MemorySaturated { .. })));
    }

    #[test]
    fn batch_is_min_of_slots_batch_and_queue() {
        let c = controller(false);
        assert_eq!(c.batch_size(10, 0, None), 2);
        assert_eq!(c.batch_size(10, 3, None), 1);
        assert_eq!(c.batch_size(1, 0, None), 1);
        assert_eq!(c.batch_size(0, 0, None), 0);
        assert_eq!(c.batch_size(10, 4, None), 0);
    }

    #[test]
    fn adaptive_widens_for_fast_tasks() {
        let c = controller(true);
        assert_eq!(c.effective_batch_size(Some(Duration::from_millis(10))), 4);
        assert_eq!(c.batch_size(10, 0, Some(Duration::from_millis(10))), 4);
    }

    #[test]
    fn adaptive_narrows_for_slow_tasks() {
        let c = controller(true);
        assert_eq!(c.effective_batch_size(Some(Duration::from_secs(5))), 1);
    }

    #[test]
    fn adaptive_keeps_base_between_bands_or_without_data() {
        let c = controller(true);
        assert_eq!(c.effective_batch_size(Some(Duration::from_millis(500))), 2);
        assert_eq!(c.effective_batch_size(None), 2);
    }

    #[test]
    fn non_adaptive_ignores_timing() {
        let c = controller(false);
        assert_eq!(c.effective_batch_size(Some(Duration::from_millis(1))), 2);
        assert_eq!(c.effective_batch_size(Some(Duration::from_secs(60))), 2);
    }

    #[test]
    fn widened_batch_never_exceeds_concurrency() {
        let c = AdmissionController::from_config(&SchedulerConfig {
            max_concurrent_tasks: 3,
            batch_size: 3,
            adaptive_batching: true,
            ..Default::default()
        });
        assert_eq!(c.effective_batch_size(Some(Duration::from_millis(1))), 3);
    }

    #[test]
    fn refusal_display() {
        let r = Refusal::ConcurrencyCeiling { active: 2, max: 2 };
        assert_eq!(r.to_string(), "2/2 tasks active");
    }
}
