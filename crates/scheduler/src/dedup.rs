use std::collections::HashMap;

use crate::types::{Fingerprint, TaskId};

/// Fingerprints of tasks currently queued or active, with their holders.
///
/// Every live task is recorded, even while deduplication is switched off, so
/// turning it back on sees tasks admitted in the meantime. A fingerprint
/// stays held across retries and is released when its task reaches a
/// terminal outcome or is discarded.
#[derive(Debug, Default)]
pub struct DedupIndex {
    holders: HashMap<Fingerprint, Vec<TaskId>>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// False if an equivalent task is already queued or active.
    pub fn should_admit(&self, fingerprint: &Fingerprint) -> bool {
        !self.holders.contains_key(fingerprint)
    }

    /// The oldest live task holding `fingerprint`, if any.
    pub fn owner(&self, fingerprint: &Fingerprint) -> Option<TaskId> {
        self.holders.get(fingerprint).and_then(|ids| ids.first().copied())
    }

    pub fn record(&mut self, fingerprint: Fingerprint, task: TaskId) {
        let ids = self.holders.entry(fingerprint).or_default();
        if !ids.contains(&task) {
            ids.push(task);
        }
    }

    /// Release `task`'s hold on `fingerprint`. Returns false if it held none.
    pub fn release(&mut self, fingerprint: &Fingerprint, task: &TaskId) -> bool {
        let Some(ids) = self.holders.get_mut(fingerprint) else {
            return false;
        };
        let Some(pos) = ids.iter().position(|id| id == task) else {
            return false;
        };
        ids.remove(pos);
        if ids.is_empty() {
            self.holders.remove(fingerprint);
        }
        true
    }

    /// Replace the whole index, e.g. after fingerprints were recomputed.
    pub fn rebuild(&mut self, live: impl IntoIterator<Item = (Fingerprint, TaskId)>) {
        self.holders.clear();
        for (fingerprint, task) in live {
            self.record(fingerprint, task);
        }
    }

    /// Number of distinct fingerprints held.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn clear(&mut self) {
        self.holders.clear();
    }
}
