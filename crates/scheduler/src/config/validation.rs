use super::types::SchedulerConfig;
use crate::error::SchedulerError;

impl SchedulerConfig {
    /// Validate ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        self.validate_positive()?;
        self.validate_thresholds()?;
        self.validate_weights()?;
        self.validate_execution_bands()?;
        Ok(())
    }

    /// Counts and intervals that must be at least 1.
    fn validate_positive(&self) -> Result<(), SchedulerError> {
        let checks: [(&str, u64); 9] = [
            ("max_concurrent_tasks", self.max_concurrent_tasks as u64),
            ("batch_size", self.batch_size as u64),
            ("fingerprint_window", self.fingerprint_window as u64),
            ("max_queue_size", self.max_queue_size as u64),
            ("cache_max_entries", self.cache_max_entries as u64),
            ("execution_history", self.execution_history as u64),
            ("tick_interval_ms", self.tick_interval_ms),
            ("task_timeout_ms", self.task_timeout_ms),
            ("metrics_interval_ms", self.metrics_interval_ms),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(SchedulerError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    /// Percent thresholds must lie in (0, 100].
    fn validate_thresholds(&self) -> Result<(), SchedulerError> {
        for (name, value) in [
            ("cpu_threshold", self.cpu_threshold),
            ("memory_threshold", self.memory_threshold),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(SchedulerError::Config(format!(
                    "{name} must be in (0, 100], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Weights must rank high > medium > low so priorities stay distinct.
    fn validate_weights(&self) -> Result<(), SchedulerError> {
        let w = &self.priority_weights;
        if !(w.high > w.medium && w.medium > w.low) {
            return Err(SchedulerError::Config(format!(
                "priority weights must satisfy high > medium > low, got {}/{}/{}",
                w.high, w.medium, w.low
            )));
        }
        Ok(())
    }

    fn validate_execution_bands(&self) -> Result<(), SchedulerError> {
        if self.fast_execution_ms > self.slow_execution_ms {
            return Err(SchedulerError::Config(format!(
                "fast_execution_ms ({}) must not exceed slow_execution_ms ({})",
                self.fast_execution_ms, self.slow_execution_ms
            )));
        }
        Ok(())
    }
}
