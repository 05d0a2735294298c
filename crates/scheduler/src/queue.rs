//! Binary max-heap of pending tasks with an id → slot index.
//!
//! The side index makes arbitrary removal O(log n), which cancellation and
//! queue-size enforcement need. Equal weights are ordered by insertion
//! sequence (older first); this is what gives FIFO fairness within a
//! priority level.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::task::Task;
use crate::types::TaskId;

struct Node {
    weight: u32,
    seq: u64,
    task: Task,
}

impl Node {
    /// Whether `self` belongs above `other` in the heap.
    fn outranks(&self, other: &Node) -> bool {
        self.weight > other.weight || (self.weight == other.weight && self.seq < other.seq)
    }
}

#[derive(Default)]
pub struct PriorityQueue {
    heap: Vec<Node>,
    index: HashMap<TaskId, usize>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task with the given heap weight.
    pub fn enqueue(&mut self, task: Task, weight: u32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = self.heap.len();
        self.index.insert(task.id, slot);
        self.heap.push(Node { weight, seq, task });
        self.sift_up(slot);
    }

    /// Remove and return the highest-weight task.
    pub fn dequeue(&mut self) -> Option<Task> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// The task `dequeue` would return next.
    pub fn peek(&self) -> Option<&Task> {
        self.heap.first().map(|n| &n.task)
    }

    /// Remove a task by id, wherever it sits in the heap.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let slot = *self.index.get(id)?;
        Some(self.remove_at(slot))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queued tasks in heap order (not dequeue order).
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.heap.iter().map(|n| &n.task)
    }

    /// Mutable access for fields that do not affect ordering. A task's id
    /// must not change while it is queued.
    pub(crate) fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.heap.iter_mut().map(|n| &mut n.task)
    }

    /// Recompute every node's weight and restore heap order in O(n).
    ///
    /// Insertion sequence numbers are kept, so FIFO order within a weight
    /// survives the rebuild.
    pub fn reweight(&mut self, weight_of: impl Fn(&Task) -> u32) {
        for node in &mut self.heap {
            node.weight = weight_of(&node.task);
        }
        for slot in (0..self.heap.len() / 2).rev() {
            self.sift_down(slot);
        }
        self.index.clear();
        for (slot, node) in self.heap.iter().enumerate() {
            self.index.insert(node.task.id, slot);
        }
    }

    /// Remove every queued task, in no particular order.
    pub fn drain(&mut self) -> Vec<Task> {
        self.index.clear();
        self.heap.drain(..).map(|n| n.task).collect()
    }

    /// Mean time queued tasks have been waiting as of `now`.
    pub fn average_wait(&self, now: Instant) -> Duration {
        if self.heap.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self
            .heap
            .iter()
            .map(|n| now.saturating_duration_since(n.task.enqueued_at))
            .sum();
        total / self.heap.len() as u32
    }

    fn remove_at(&mut self, slot: usize) -> Task {
        let node = self.heap.swap_remove(slot);
        self.index.remove(&node.task.id);
        if slot < self.heap.len() {
            self.index.insert(self.heap[slot].task.id, slot);
            // The moved node may need to travel either way.
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        }
        node.task
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.heap[slot].outranks(&self.heap[parent]) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut best = slot;
            if left < len && self.heap[left].outranks(&self.heap[best]) {
                best = left;
            }
            if right < len && self.heap[right].outranks(&self.heap[best]) {
                best = right;
            }
            if best == slot {
                break;
            }
            self.swap(slot, best);
            slot = best;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.index.insert(self.heap[a].task.id, a);
        self.index.insert(self.heap[b].task.id, b);
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        for (slot, node) in self.heap.iter().enumerate() {
            assert_eq!(self.index[&node.task.id], slot, "index out of sync");
            if slot > 0 {
                let parent = &self.heap[(slot - 1) / 2];
                assert!(parent.weight >= node.weight, "heap order violated at {slot}");
            }
        }
        assert_eq!(self.index.len(), self.heap.len());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::task::test_support::{bars, Named};
    use crate::types::Priority;

    fn task(tag: f64) -> Task {
        Task::new(Arc::new(Named("s")), bars("X", tag, 1), Priority::Medium, 0, 10)
    }

    fn weights_in_dequeue_order(q: &mut PriorityQueue) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(t) = q.dequeue() {
            out.push(t.payload[0].close as u32);
        }
        out
    }

    #[test]
    fn dequeues_highest_weight_first() {
        let mut q = PriorityQueue::new();
        for w in [1, 3, 2, 3] {
            q.enqueue(task(w as f64), w);
            q.assert_invariants();
        }
        assert_eq!(weights_in_dequeue_order(&mut q), vec![3, 3, 2, 1]);
    }

    #[test]
    fn equal_weights_come_out_in_insertion_order() {
        let mut q = PriorityQueue::new();
        let ids: Vec<TaskId> = (0..6)
            .map(|i| {
                let t = task(i as f64);
                let id = t.id;
                q.enqueue(t, 2);
                id
            })
            .collect();
        let out: Vec<TaskId> = std::iter::from_fn(|| q.dequeue()).map(|t| t.id).collect();
        assert_eq!(out, ids);
    }

    #[test]
    fn peek_matches_dequeue() {
        let mut q = PriorityQueue::new();
        assert!(q.peek().is_none());
        q.enqueue(task(1.0), 1);
        q.enqueue(task(5.0), 5);
        let peeked = q.peek().unwrap().id;
        assert_eq!(q.dequeue().unwrap().id, peeked);
    }

    #[test]
    fn remove_arbitrary_keeps_heap_valid() {
        let mut q = PriorityQueue::new();
        let mut ids = Vec::new();
        for w in [5, 1, 4, 2, 3, 9, 7, 6, 8] {
            let t = task(w as f64);
            ids.push((t.id, w));
            q.enqueue(t, w);
        }

        let (mid_id, _) = ids[2];
        assert!(q.remove(&mid_id).is_some());
        q.assert_invariants();
        assert!(!q.contains(&mid_id));
        assert!(q.remove(&mid_id).is_none());

        let (root_id, _) = ids[5];
        assert!(q.remove(&root_id).is_some());
        q.assert_invariants();

        assert_eq!(weights_in_dequeue_order(&mut q), vec![8, 7, 6, 5, 3, 2, 1]);
    }

    #[test]
    fn remove_last_slot() {
        let mut q = PriorityQueue::new();
        let a = task(2.0);
        let b = task(1.0);
        let b_id = b.id;
        q.enqueue(a, 2);
        q.enqueue(b, 1);
        assert!(q.remove(&b_id).is_some());
        q.assert_invariants();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn drain_empties_queue_and_index() {
        let mut q = PriorityQueue::new();
        for w in 0..4 {
            q.enqueue(task(w as f64), w);
        }
        let drained = q.drain();
        assert_eq!(drained.len(), 4);
        assert!(q.is_empty());
        q.assert_invariants();
    }

    #[test]
    fn reweight_reorders_existing_nodes() {
        let mut q = PriorityQueue::new();
        for w in [1, 2, 3, 4, 5, 6] {
            q.enqueue(task(w as f64), w);
        }
        // Invert the scale: the smallest close now ranks highest.
        q.reweight(|t| 10 - t.payload[0].close as u32);
        q.assert_invariants();
        assert_eq!(weights_in_dequeue_order(&mut q), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn reweight_keeps_fifo_within_a_weight() {
        let mut q = PriorityQueue::new();
        let ids: Vec<TaskId> = (0..5)
            .map(|i| {
                let t = task(i as f64);
                let id = t.id;
                q.enqueue(t, i);
                id
            })
            .collect();
        q.reweight(|_| 7);
        q.assert_invariants();
        let out: Vec<TaskId> = std::iter::from_fn(|| q.dequeue()).map(|t| t.id).collect();
        assert_eq!(out, ids);
    }

    #[test]
    fn average_wait_is_zero_when_empty() {
        let q = PriorityQueue::new();
        assert_eq!(q.average_wait(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn average_wait_grows_with_time() {
        let mut q = PriorityQueue::new();
        q.enqueue(task(1.0), 1);
        let later = Instant::now() + Duration::from_millis(50);
        assert!(q.average_wait(later) >= Duration::from_millis(50));
    }
}
