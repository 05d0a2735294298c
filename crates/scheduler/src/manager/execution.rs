use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinError;
use tracing::{debug, error, warn};
use tradebot_core::Signal;

use crate::admission::AdmissionController;
use crate::events::SchedulerEvent;
use crate::task::Task;
use crate::types::{ExecutionResult, TickReport};

use super::state::ActiveTask;
use super::ExecutionManager;

/// What one strategy invocation produced, errors already rendered to text.
type Outcome = Result<Vec<Signal>, String>;

impl ExecutionManager {
    /// Run one scheduling tick.
    ///
    /// Samples load, asks admission control, then dequeues up to the batch
    /// size. Tasks with a fresh cached result complete immediately without
    /// taking a concurrency slot; the rest are spawned onto the runtime.
    pub fn tick(&self) -> TickReport {
        let config = self.config();
        let admission = AdmissionController::from_config(&config);
        let active_now = *self.inner.active_count.borrow();
        let load = self
            .load_source()
            .sample(active_now, config.max_concurrent_tasks);

        let mut report = TickReport::default();
        let mut dispatch = Vec::new();
        {
            let mut state = self.lock_state();
            if state.queue.is_empty() {
                return report;
            }

            let active = state.active.len();
            if let Err(refusal) = admission.check(load, active) {
                debug!(%refusal, queued = state.queue.len(), "tick skipped");
                self.inner.events.emit(SchedulerEvent::TickSkipped {
                    reason: refusal.to_string(),
                });
                report.skipped = true;
                return report;
            }

            let hint = state.batch_timing_hint();
            let batch = admission.batch_size(state.queue.len(), active, hint);
            let now = Instant::now();

            for _ in 0..batch {
                let Some(task) = state.queue.dequeue() else {
                    break;
                };

                if config.cache_enabled {
                    if let Some(signals) = state.cache.get(&task.fingerprint, now) {
                        state.dedup.release(&task.fingerprint, &task.id);
                        state.stats.record_terminal(true);
                        debug!(task_id = %task.id, strategy = %task.strategy_name(), "served from cache");
                        report.cache_hits.push(task.id);
                        self.inner.events.emit(SchedulerEvent::ExecutionSuccess(ExecutionResult {
                            task_id: task.id,
                            strategy_name: task.strategy_name().to_string(),
                            signals,
                            execution_time_ms: 0,
                            success: true,
                            error: None,
                            attempts: task.retry_count,
                            from_cache: true,
                            completed_at: Utc::now(),
                        }));
                        continue;
                    }
                }

                state.active.insert(
                    task.id,
                    ActiveTask {
                        strategy_name: task.strategy_name().to_string(),
                        started_at: now,
                        fingerprint: task.fingerprint,
                        payload: Arc::clone(&task.payload),
                    },
                );
                report.dispatched.push(task.id);
                dispatch.push(task);
            }
            self.inner.active_count.send_replace(state.active.len());
        }

        let timeout = config.task_timeout();
        for task in dispatch {
            debug!(task_id = %task.id, strategy = %task.strategy_name(), attempt = task.attempts(), "dispatching");
            let manager = self.clone();
            tokio::spawn(async move { manager.run_task(task, timeout).await });
        }
        report
    }

    /// Invoke the strategy on its own Tokio task so a panic or a timeout
    /// never takes the scheduler down with it.
    async fn run_task(self, task: Task, timeout: Duration) {
        let started = Instant::now();
        let strategy = Arc::clone(&task.strategy);
        let payload = Arc::clone(&task.payload);
        let mut handle = tokio::spawn(async move { strategy.generate_signals(&payload).await });

        let outcome: Outcome = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(signals))) => Ok(signals),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(join_err)) => Err(describe_join_error(join_err)),
            Err(_) => {
                // Best effort: a strategy that never yields keeps its worker.
                handle.abort();
                Err(format!("timed out after {}ms", timeout.as_millis()))
            }
        };

        self.complete(task, outcome, started.elapsed());
    }

    /// Route a finished attempt to success, retry or terminal failure.
    fn complete(&self, mut task: Task, outcome: Outcome, elapsed: Duration) {
        let config = self.config();
        let execution_time_ms = elapsed.as_millis() as u64;
        let mut state = self.lock_state();
        if let Some(active) = state.active.remove(&task.id) {
            // Rehashed if the fingerprint window changed mid-flight.
            task.fingerprint = active.fingerprint;
        }

        match outcome {
            Ok(signals) => {
                state.stats.record_execution(task.strategy_name(), elapsed);
                if config.cache_enabled {
                    state.cache.put(task.fingerprint, signals.clone(), Instant::now());
                }
                state.dedup.release(&task.fingerprint, &task.id);
                state.stats.record_terminal(true);
                debug!(
                    task_id = %task.id,
                    strategy = %task.strategy_name(),
                    signals = signals.len(),
                    elapsed_ms = execution_time_ms,
                    "strategy execution succeeded"
                );
                self.inner.events.emit(SchedulerEvent::ExecutionSuccess(ExecutionResult {
                    task_id: task.id,
                    strategy_name: task.strategy_name().to_string(),
                    signals,
                    execution_time_ms,
                    success: true,
                    error: None,
                    attempts: task.attempts(),
                    from_cache: false,
                    completed_at: Utc::now(),
                }));
            }
            Err(error) => {
                let attempts = task.attempts();
                task.demote_for_retry();

                if task.can_retry() {
                    state.stats.retried += 1;
                    warn!(
                        task_id = %task.id,
                        strategy = %task.strategy_name(),
                        attempt = attempts,
                        max_retries = task.max_retries,
                        %error,
                        "strategy execution failed, retrying at low priority"
                    );
                    self.inner.events.emit(SchedulerEvent::TaskRetrying {
                        task_id: task.id,
                        strategy_name: task.strategy_name().to_string(),
                        attempt: attempts,
                        error,
                    });
                    task.enqueued_at = Instant::now();
                    let weight = state.weights.weight_of(task.priority);
                    state.queue.enqueue(task, weight);
                } else {
                    state.dedup.release(&task.fingerprint, &task.id);
                    state.stats.record_terminal(false);
                    error!(
                        task_id = %task.id,
                        strategy = %task.strategy_name(),
                        attempts,
                        %error,
                        "strategy execution failed permanently"
                    );
                    self.inner.events.emit(SchedulerEvent::ExecutionFailed(ExecutionResult {
                        task_id: task.id,
                        strategy_name: task.strategy_name().to_string(),
                        signals: Vec::new(),
                        execution_time_ms,
                        success: false,
                        error: Some(error),
                        attempts,
                        from_cache: false,
                        completed_at: Utc::now(),
                    }));
                }
            }
        }

        self.inner.active_count.send_replace(state.active.len());
    }
}

fn describe_join_error(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            format!("strategy panicked: {message}")
        }
        Err(err) => format!("strategy task cancelled: {err}"),
    }
}
