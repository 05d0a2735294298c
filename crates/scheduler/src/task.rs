use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tradebot_core::{MarketData, SharedStrategy};

use crate::types::{Fingerprint, Priority, TaskId};

/// Derive the dedup/cache key for a strategy evaluation.
///
/// Only the last `window` bars take part, so the cost is bounded no matter
/// how long the payload is. Two payloads that differ only before the window
/// collapse onto the same fingerprint.
pub fn fingerprint(strategy_name: &str, payload: &[MarketData], window: usize) -> Fingerprint {
    let mut hasher = DefaultHasher::new();
    strategy_name.hash(&mut hasher);
    let start = payload.len().saturating_sub(window);
    payload[start..].hash(&mut hasher);
    Fingerprint(hasher.finish())
}

/// One scheduled invocation of a strategy against a market-data window.
///
/// Owned by the execution manager from submission until its terminal outcome.
pub struct Task {
    pub id: TaskId,
    pub strategy: SharedStrategy,
    pub payload: Arc<[MarketData]>,
    pub priority: Priority,
    pub retry_count: u32,
    pub max_retries: u32,
    pub fingerprint: Fingerprint,
    pub submitted_at: DateTime<Utc>,
    /// Reset on every (re-)enqueue; drives queue wait statistics.
    pub enqueued_at: Instant,
    /// Advisory only, never used for correctness.
    pub estimated_execution: Duration,
}

impl Task {
    pub fn new(
        strategy: SharedStrategy,
        payload: Vec<MarketData>,
        priority: Priority,
        max_retries: u32,
        fingerprint_window: usize,
    ) -> Self {
        let fingerprint = fingerprint(strategy.name(), &payload, fingerprint_window);
        Self {
            id: TaskId::new(),
            strategy,
            payload: payload.into(),
            priority,
            retry_count: 0,
            max_retries,
            fingerprint,
            submitted_at: Utc::now(),
            enqueued_at: Instant::now(),
            estimated_execution: Duration::ZERO,
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Total strategy invocations made so far, counting the one in flight.
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// Whether another attempt is allowed after a failure has been counted.
    pub fn can_retry(&self) -> bool {
        self.retry_count <= self.max_retries
    }

    /// Record a failed attempt and demote for re-queueing.
    pub fn demote_for_retry(&mut self) {
        self.retry_count += 1;
        self.priority = Priority::Low;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("strategy", &self.strategy.name())
            .field("payload_len", &self.payload.len())
            .field("priority", &self.priority)
            .field("retry_count", &self.retry_count)
            .field("max_retries", &self.max_retries)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tradebot_core::{MarketData, Signal, Strategy, StrategyError};

    /// Strategy that returns no signals; only its name matters.
    pub struct Named(pub &'static str);

    #[async_trait]
    impl Strategy for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn generate_signals(&self, _data: &[MarketData]) -> Result<Vec<Signal>, StrategyError> {
            Ok(Vec::new())
        }
    }

    /// `n` bars with closes `base, base+1, ...` at fixed timestamps.
    pub fn bars(symbol: &str, base: f64, n: usize) -> Vec<MarketData> {
        (0..n)
            .map(|i| {
                let ts = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
                MarketData::flat(symbol, ts, base + i as f64, 1.0)
            })
            .collect()
    }
}
