use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tradebot_core::Signal;

use crate::types::Fingerprint;

struct CacheEntry {
    signals: Vec<Signal>,
    written_at: Instant,
}

/// TTL- and capacity-bounded cache of the last successful signals per fingerprint.
///
/// An entry whose age has reached the TTL is never returned. Expired entries
/// are evicted lazily on lookup and in bulk by [`ResultCache::sweep_expired`].
pub struct ResultCache {
    entries: LruCache<Fingerprint, CacheEntry>,
    ttl: Duration,
    window_hits: u64,
    window_misses: u64,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            ttl,
            window_hits: 0,
            window_misses: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a fresh result as of `now`.
    pub fn get(&mut self, fingerprint: &Fingerprint, now: Instant) -> Option<Vec<Signal>> {
        let age = self
            .entries
            .peek(fingerprint)
            .map(|e| now.saturating_duration_since(e.written_at));

        match age {
            None => {
                self.record_miss();
                None
            }
            Some(age) if age >= self.ttl => {
                self.entries.pop(fingerprint);
                self.record_miss();
                None
            }
            Some(_) => {
                self.window_hits += 1;
                self.hits += 1;
                self.entries.get(fingerprint).map(|e| e.signals.clone())
            }
        }
    }

    pub fn put(&mut self, fingerprint: Fingerprint, signals: Vec<Signal>, now: Instant) {
        self.entries.put(
            fingerprint,
            CacheEntry {
                signals,
                written_at: now,
            },
        );
    }

    /// Drop every entry whose age has reached the TTL. Returns how many were dropped.
    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.written_at) >= self.ttl)
            .map(|(fp, _)| *fp)
            .collect();
        for fp in &expired {
            self.entries.pop(fp);
        }
        expired.len()
    }

    /// Hit ratio since the previous call; resets the window counters.
    pub fn take_window_hit_ratio(&mut self) -> f64 {
        let total = self.window_hits + self.window_misses;
        let ratio = if total == 0 {
            0.0
        } else {
            self.window_hits as f64 / total as f64
        };
        self.window_hits = 0;
        self.window_misses = 0;
        ratio
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn resize(&mut self, capacity: usize) {
        self.entries
            .resize(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_miss(&mut self) {
        self.window_misses += 1;
        self.misses += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradebot_core::SignalSide;

    const TTL: Duration = Duration::from_millis(500);

    fn signal(price: f64) -> Vec<Signal> {
        vec![Signal::new("s", "BTCUSDT", SignalSide::Buy, price, 0.9)]
    }

    #[test]
    fn hit_within_ttl() {
        let mut cache = ResultCache::new(16, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(10.0), t0);

        let got = cache.get(&Fingerprint(1), t0 + Duration::from_millis(499)).unwrap();
        assert_eq!(got[0].price, 10.0);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn miss_exactly_at_ttl_boundary() {
        let mut cache = ResultCache::new(16, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(10.0), t0);

        assert!(cache.get(&Fingerprint(1), t0 + TTL).is_none());
        assert_eq!(cache.misses(), 1);
        // Lazily evicted.
        assert!(cache.is_empty());
    }

    #[test]
    fn miss_after_ttl() {
        let mut cache = ResultCache::new(16, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(10.0), t0);
        assert!(cache.get(&Fingerprint(1), t0 + TTL * 3).is_none());
    }

    #[test]
    fn sweep_drops_only_expired() {
        let mut cache = ResultCache::new(16, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(1.0), t0);
        cache.put(Fingerprint(2), signal(2.0), t0 + Duration::from_millis(400));

        let dropped = cache.sweep_expired(t0 + Duration::from_millis(600));
        assert_eq!(dropped, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&Fingerprint(2), t0 + Duration::from_millis(600)).is_some());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let mut cache = ResultCache::new(2, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(1.0), t0);
        cache.put(Fingerprint(2), signal(2.0), t0);
        cache.put(Fingerprint(3), signal(3.0), t0);

        assert!(cache.get(&Fingerprint(1), t0).is_none());
        assert!(cache.get(&Fingerprint(3), t0).is_some());
    }

    #[test]
    fn shorter_ttl_applies_to_existing_entries() {
        let mut cache = ResultCache::new(16, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(1.0), t0);
        cache.set_ttl(Duration::from_millis(100));
        assert!(cache.get(&Fingerprint(1), t0 + Duration::from_millis(150)).is_none());
    }

    #[test]
    fn window_ratio_resets() {
        let mut cache = ResultCache::new(16, TTL);
        let t0 = Instant::now();
        cache.put(Fingerprint(1), signal(1.0), t0);
        cache.get(&Fingerprint(1), t0); // hit
        cache.get(&Fingerprint(2), t0); // miss

        assert!((cache.take_window_hit_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(cache.take_window_hit_ratio(), 0.0);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }
}
