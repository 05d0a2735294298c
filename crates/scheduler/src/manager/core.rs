use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tradebot_core::{MarketData, SharedStrategy};

use crate::config::{ConfigPatch, SchedulerConfig};
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::load::{self, LoadSource};
use crate::task::Task;
use crate::types::{Priority, QueueStatus, SystemMetrics, TaskId, TaskState};

use super::state::SchedulerState;

pub(super) struct Inner {
    pub config: RwLock<SchedulerConfig>,
    pub state: Mutex<SchedulerState>,
    /// Latest sampler snapshot, replaced wholesale on each sample.
    pub metrics: RwLock<SystemMetrics>,
    pub events: EventBus,
    pub load_source: RwLock<Arc<dyn LoadSource>>,
    /// Number of active tasks, mirrored for lock-free reads and idle waits.
    pub active_count: watch::Sender<usize>,
    pub running: AtomicBool,
    pub shutdown: watch::Sender<bool>,
    pub loops: Mutex<Vec<JoinHandle<()>>>,
}

/// The strategy execution scheduler.
///
/// Cheap to clone; clones share the same queue, cache and loops. Methods
/// that dispatch work (`tick`, `start`) must run inside a Tokio runtime.
#[derive(Clone)]
pub struct ExecutionManager {
    pub(super) inner: Arc<Inner>,
}

impl ExecutionManager {
    /// Create a manager using the load source named in `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let source: Arc<dyn LoadSource> = Arc::from(load::from_kind(config.load_source));
        Self::with_load_source(config, source)
    }

    /// Create a manager with a caller-provided load source.
    ///
    /// A later config patch that changes `load_source` replaces it with the
    /// built-in source of that kind.
    pub fn with_load_source(
        config: SchedulerConfig,
        load_source: Arc<dyn LoadSource>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let (active_count, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);
        let state = SchedulerState::new(&config);
        Ok(Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                state: Mutex::new(state),
                metrics: RwLock::new(SystemMetrics::default()),
                events: EventBus::new(),
                load_source: RwLock::new(load_source),
                active_count,
                running: AtomicBool::new(false),
                shutdown,
                loops: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Submit a strategy evaluation.
    ///
    /// Rejected synchronously when `max_retries` exceeds the configured
    /// limit, when an equivalent task is already queued or active (with
    /// deduplication on), or when the queue is full.
    pub fn add_task(
        &self,
        strategy: SharedStrategy,
        market_data: Vec<MarketData>,
        priority: Priority,
        max_retries: u32,
    ) -> Result<TaskId, SchedulerError> {
        let config = self.config();
        if max_retries > config.max_retries_limit {
            return Err(SchedulerError::InvalidRetries {
                requested: max_retries,
                limit: config.max_retries_limit,
            });
        }

        let mut state = self.lock_state();
        let window = state.fingerprint_window;
        let mut task = Task::new(strategy, market_data, priority, max_retries, window);

        if config.dedup_enabled {
            if let Some(existing) = state.dedup.owner(&task.fingerprint) {
                state.stats.rejected += 1;
                debug!(
                    strategy = %task.strategy_name(),
                    fingerprint = %task.fingerprint,
                    existing = %existing,
                    "duplicate submission rejected"
                );
                return Err(SchedulerError::Duplicate {
                    fingerprint: task.fingerprint,
                    existing,
                });
            }
        }

        if state.queue.len() >= config.max_queue_size {
            state.stats.rejected += 1;
            warn!(
                strategy = %task.strategy_name(),
                capacity = config.max_queue_size,
                "queue full, submission rejected"
            );
            return Err(SchedulerError::QueueFull {
                capacity: config.max_queue_size,
            });
        }

        task.estimated_execution = state.stats.estimate_for(task.strategy_name());
        task.enqueued_at = Instant::now();
        let id = task.id;
        let event = SchedulerEvent::TaskAdded {
            task_id: id,
            strategy_name: task.strategy_name().to_string(),
            priority,
            fingerprint: task.fingerprint,
        };

        // Recorded even with dedup off, so re-enabling it sees this task.
        state.dedup.record(task.fingerprint, id);
        debug!(task_id = %id, strategy = %task.strategy_name(), ?priority, "task queued");
        let weight = state.weights.weight_of(priority);
        state.queue.enqueue(task, weight);
        state.stats.submitted += 1;
        self.inner.events.emit(event);
        Ok(id)
    }

    /// Like [`add_task`](Self::add_task) with the priority given by name.
    pub fn add_task_named(
        &self,
        strategy: SharedStrategy,
        market_data: Vec<MarketData>,
        priority: &str,
        max_retries: u32,
    ) -> Result<TaskId, SchedulerError> {
        let priority: Priority = priority.parse()?;
        self.add_task(strategy, market_data, priority, max_retries)
    }

    /// Remove a queued task. Active tasks cannot be cancelled.
    pub fn cancel_task(&self, task_id: &TaskId) -> bool {
        let mut state = self.lock_state();
        match state.queue.remove(task_id) {
            Some(task) => {
                state.dedup.release(&task.fingerprint, &task.id);
                debug!(task_id = %task_id, "queued task cancelled");
                true
            }
            None => false,
        }
    }

    /// Discard every queued (not active) task and its dedup entry.
    pub fn clear_queue(&self) -> usize {
        let mut state = self.lock_state();
        let discarded = state.queue.drain();
        for task in &discarded {
            state.dedup.release(&task.fingerprint, &task.id);
        }
        let count = discarded.len();
        info!(discarded = count, "queue cleared");
        self.inner
            .events
            .emit(SchedulerEvent::QueueCleared { discarded: count });
        count
    }

    /// Hot-reload part of the config.
    ///
    /// The merged config is validated first; on error nothing changes.
    /// Queued tasks are re-weighted when the priority weights change and
    /// re-fingerprinted when the fingerprint window changes. Active tasks
    /// keep the timeout they were dispatched with.
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<(), SchedulerError> {
        let mut config = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = config.merged(patch)?;

        {
            let mut state = self.lock_state();
            if !next.cache_enabled {
                state.cache.clear();
            }
            state.cache.set_ttl(next.cache_ttl());
            state.cache.resize(next.cache_max_entries);
            state.stats.set_history_capacity(next.execution_history);
            if next.priority_weights != state.weights {
                state.reweight(next.priority_weights);
                info!(
                    high = next.priority_weights.high,
                    medium = next.priority_weights.medium,
                    low = next.priority_weights.low,
                    queued = state.queue.len(),
                    "priority weights changed, queue re-weighted"
                );
            }
            if next.fingerprint_window != state.fingerprint_window {
                state.refingerprint(next.fingerprint_window);
                info!(
                    window = next.fingerprint_window,
                    live = state.queue.len() + state.active.len(),
                    "fingerprint window changed, live tasks re-fingerprinted"
                );
            }
        }

        if next.load_source != config.load_source {
            let source: Arc<dyn LoadSource> = Arc::from(load::from_kind(next.load_source));
            info!(source = source.name(), "load source replaced");
            *self
                .inner
                .load_source
                .write()
                .unwrap_or_else(PoisonError::into_inner) = source;
        }

        *config = next;
        info!("scheduler config updated");
        Ok(())
    }

    /// The latest metrics snapshot taken by the sampler.
    pub fn get_metrics(&self) -> SystemMetrics {
        self.inner
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Live queue occupancy.
    pub fn get_queue_status(&self) -> QueueStatus {
        let max_concurrent = self.config().max_concurrent_tasks;
        let state = self.lock_state();
        QueueStatus {
            queued_count: state.queue.len(),
            active_count: state.active.len(),
            max_concurrent,
            avg_wait_ms: state.queue.average_wait(Instant::now()).as_secs_f64() * 1_000.0,
        }
    }

    /// Where a live task sits, or `None` once it is terminal, cancelled or unknown.
    pub fn task_state(&self, task_id: &TaskId) -> Option<TaskState> {
        let state = self.lock_state();
        if state.active.contains_key(task_id) {
            Some(TaskState::Active)
        } else if state.queue.contains(task_id) {
            Some(TaskState::Queued)
        } else {
            None
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// A copy of the current config.
    pub fn config(&self) -> SchedulerConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn load_source(&self) -> Arc<dyn LoadSource> {
        Arc::clone(
            &self
                .inner
                .load_source
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
