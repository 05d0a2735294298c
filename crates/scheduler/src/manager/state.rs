use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tradebot_core::MarketData;

use crate::cache::ResultCache;
use crate::config::SchedulerConfig;
use crate::dedup::DedupIndex;
use crate::metrics::ExecutionStats;
use crate::queue::PriorityQueue;
use crate::task::fingerprint;
use crate::types::{Fingerprint, PriorityWeights, TaskId};

/// Bookkeeping for a task whose strategy call is in flight.
#[derive(Debug, Clone)]
pub(crate) struct ActiveTask {
    pub strategy_name: String,
    pub started_at: Instant,
    /// Authoritative while active; recomputed if the fingerprint window changes.
    pub fingerprint: Fingerprint,
    pub payload: Arc<[MarketData]>,
}

/// Everything tick, completion handlers and producers mutate.
///
/// Guarded by a single mutex that is never held across an `.await`. The
/// weights and fingerprint window live here as well as in the config so that
/// every task is weighed and hashed on the scale its queue-mates use.
pub(crate) struct SchedulerState {
    pub queue: PriorityQueue,
    pub dedup: DedupIndex,
    pub cache: ResultCache,
    pub active: HashMap<TaskId, ActiveTask>,
    pub stats: ExecutionStats,
    pub weights: PriorityWeights,
    pub fingerprint_window: usize,
}

impl SchedulerState {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            queue: PriorityQueue::new(),
            dedup: DedupIndex::new(),
            cache: ResultCache::new(config.cache_max_entries, config.cache_ttl()),
            active: HashMap::new(),
            stats: ExecutionStats::new(config.execution_history),
            weights: config.priority_weights,
            fingerprint_window: config.fingerprint_window,
        }
    }

    /// Mean execution time for batch sizing: the rolling average, or the
    /// head task's advisory estimate before anything has run.
    pub fn batch_timing_hint(&self) -> Option<Duration> {
        self.stats.rolling_average().or_else(|| {
            self.queue
                .peek()
                .map(|t| t.estimated_execution)
                .filter(|d| !d.is_zero())
        })
    }

    /// Switch to new priority weights and re-heapify the queued tasks.
    pub fn reweight(&mut self, weights: PriorityWeights) {
        self.weights = weights;
        self.queue.reweight(|task| weights.weight_of(task.priority));
    }

    /// Switch to a new fingerprint window: rehash every live task and
    /// rebuild the dedup index. Cached results are keyed on the old window
    /// and are dropped.
    pub fn refingerprint(&mut self, window: usize) {
        self.fingerprint_window = window;
        for task in self.queue.tasks_mut() {
            let fp = fingerprint(task.strategy_name(), &task.payload, window);
            task.fingerprint = fp;
        }
        for active in self.active.values_mut() {
            active.fingerprint = fingerprint(&active.strategy_name, &active.payload, window);
        }

        let live: Vec<(Fingerprint, TaskId)> = self
            .queue
            .iter()
            .map(|t| (t.fingerprint, t.id))
            .chain(self.active.iter().map(|(id, a)| (a.fingerprint, *id)))
            .collect();
        self.dedup.rebuild(live);
        self.cache.clear();
    }
}
