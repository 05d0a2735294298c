use std::sync::atomic::Ordering;
use std::sync::PoisonError;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::SchedulerError;
use crate::events::SchedulerEvent;
use crate::types::{SystemMetrics, TaskId};

use super::state::SchedulerState;
use super::ExecutionManager;

/// Outcome of [`ExecutionManager::stop`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopReport {
    /// Every in-flight task finished within the grace period.
    pub drained: bool,
    /// Tasks still running when the grace period ran out.
    pub still_active: Vec<TaskId>,
}

impl ExecutionManager {
    /// Start the tick and metrics loops on the current Tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.inner.shutdown.send_replace(false);
        let config = self.config();
        info!(
            "Scheduler starting: {} concurrent slots, tick every {:?}, load source {}",
            config.max_concurrent_tasks,
            config.tick_interval(),
            self.load_source().name()
        );

        let tick_loop = {
            let manager = self.clone();
            let mut shutdown = self.inner.shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    manager.tick();
                    let interval = manager.config().tick_interval();
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = shutdown.changed() => break,
                    }
                }
                debug!("tick loop stopped");
            })
        };

        let metrics_loop = {
            let manager = self.clone();
            let mut shutdown = self.inner.shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    let interval = manager.config().metrics_interval();
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = shutdown.changed() => break,
                    }
                    manager.sample_metrics();
                }
                debug!("metrics loop stopped");
            })
        };

        self.inner
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([tick_loop, metrics_loop]);
        Ok(())
    }

    /// Take a metrics snapshot now, publish it and return it.
    ///
    /// Also sweeps expired cache entries. The throughput and cache hit ratio
    /// windows restart at every sample.
    pub fn sample_metrics(&self) -> SystemMetrics {
        let max_concurrent = self.config().max_concurrent_tasks;
        let active_now = *self.inner.active_count.borrow();
        let load = self.load_source().sample(active_now, max_concurrent);

        let snapshot = {
            let mut state = self.lock_state();
            let now = Instant::now();
            let swept = state.cache.sweep_expired(now);
            if swept > 0 {
                debug!(swept, "expired cache entries dropped");
            }
            let active = state.active.len();
            let SchedulerState {
                queue, cache, stats, ..
            } = &mut *state;
            stats.snapshot(load, active, queue, cache, now)
        };
        debug!(
            cpu = snapshot.cpu_usage,
            memory = snapshot.memory_usage,
            active = snapshot.active_tasks,
            queued = snapshot.queued_tasks,
            throughput = snapshot.throughput,
            "metrics sampled"
        );

        *self
            .inner
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        self.inner
            .events
            .emit(SchedulerEvent::MetricsUpdated(snapshot.clone()));
        snapshot
    }

    /// Resolve once no task is active. Queued tasks are not waited for.
    pub async fn wait_idle(&self) {
        let mut active = self.inner.active_count.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = active.wait_for(|count| *count == 0).await;
    }

    /// Stop both loops, then wait up to the shutdown grace period for
    /// in-flight tasks. Queued tasks stay queued; a later `start` resumes them.
    pub async fn stop(&self) -> StopReport {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            debug!("stop called on a scheduler that is not running");
        }
        self.inner.shutdown.send_replace(true);

        let loops: Vec<_> = self
            .inner
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in loops {
            if let Err(e) = handle.await {
                warn!("scheduler loop ended abnormally: {}", e);
            }
        }

        let grace = self.config().shutdown_grace();
        let drained = tokio::time::timeout(grace, self.wait_idle()).await.is_ok();

        let still_active = if drained {
            Vec::new()
        } else {
            let state = self.lock_state();
            for (id, task) in &state.active {
                warn!(
                    task_id = %id,
                    strategy = %task.strategy_name,
                    running_ms = task.started_at.elapsed().as_millis() as u64,
                    "task still running after shutdown grace period"
                );
            }
            state.active.keys().copied().collect()
        };

        self.sample_metrics();
        info!(
            "Scheduler stopped (drained: {}, still active: {})",
            drained,
            still_active.len()
        );
        StopReport {
            drained,
            still_active,
        }
    }
}
