//! Scheduler events and their broadcast fan-out.
//!
//! Event names are a stable contract for external consumers (dashboards,
//! notifiers). Subscribers that fall behind lose the oldest events; the
//! scheduler never waits on a subscriber.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::{ExecutionResult, Fingerprint, Priority, SystemMetrics, TaskId};

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_BUFFER: usize = 1_024;

// ── Event names ──────────────────────────────────────────────────────

pub const TASK_ADDED: &str = "taskAdded";
pub const EXECUTION_SUCCESS: &str = "executionSuccess";
pub const EXECUTION_FAILED: &str = "executionFailed";
pub const METRICS_UPDATED: &str = "metricsUpdated";
pub const TASK_RETRYING: &str = "taskRetrying";
pub const QUEUE_CLEARED: &str = "queueCleared";
pub const TICK_SKIPPED: &str = "tickSkipped";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum SchedulerEvent {
    /// A submission passed validation and dedup and was queued.
    TaskAdded {
        task_id: TaskId,
        strategy_name: String,
        priority: Priority,
        fingerprint: Fingerprint,
    },
    /// Terminal success, including cache-served results.
    ExecutionSuccess(ExecutionResult),
    /// Terminal failure after the retry budget was spent.
    ExecutionFailed(ExecutionResult),
    MetricsUpdated(SystemMetrics),
    /// A failed attempt was re-queued at low priority.
    TaskRetrying {
        task_id: TaskId,
        strategy_name: String,
        /// Attempts made so far.
        attempt: u32,
        error: String,
    },
    QueueCleared { discarded: usize },
    TickSkipped { reason: String },
}

impl SchedulerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::TaskAdded { .. } => TASK_ADDED,
            SchedulerEvent::ExecutionSuccess(_) => EXECUTION_SUCCESS,
            SchedulerEvent::ExecutionFailed(_) => EXECUTION_FAILED,
            SchedulerEvent::MetricsUpdated(_) => METRICS_UPDATED,
            SchedulerEvent::TaskRetrying { .. } => TASK_RETRYING,
            SchedulerEvent::QueueCleared { .. } => QUEUE_CLEARED,
            SchedulerEvent::TickSkipped { .. } => TICK_SKIPPED,
        }
    }

    /// The terminal result carried by this event, if any.
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            SchedulerEvent::ExecutionSuccess(r) | SchedulerEvent::ExecutionFailed(r) => Some(r),
            _ => None,
        }
    }
}

/// Broadcast fan-out of [`SchedulerEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Publish to all current subscribers. Having none is not an error.
    pub fn emit(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_name() {
        let events = [
            SchedulerEvent::QueueCleared { discarded: 2 },
            SchedulerEvent::TickSkipped { reason: "busy".into() },
            SchedulerEvent::MetricsUpdated(SystemMetrics::default()),
            SchedulerEvent::TaskAdded {
                task_id: TaskId::new(),
                strategy_name: "s".into(),
                priority: Priority::High,
                fingerprint: Fingerprint(1),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(SchedulerEvent::QueueCleared { discarded: 3 });

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                SchedulerEvent::QueueCleared { discarded } => assert_eq!(discarded, 3),
                other => panic!("unexpected event {}", other.name()),
            }
        }
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        EventBus::new().emit(SchedulerEvent::TickSkipped { reason: "x".into() });
    }
}
