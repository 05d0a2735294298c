use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one symbol.
///
/// The scheduler treats market data as opaque input; it only hashes it
/// when deriving task fingerprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MarketData {
    /// A bar where every price equals `price`. Handy for ticks and tests.
    pub fn flat(symbol: impl Into<String>, timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Typical price: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

// Prices are hashed by bit pattern, so 0.0 and -0.0 hash differently.
// That only costs a dedup miss, never a false match.
impl Hash for MarketData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.timestamp.timestamp_nanos_opt().hash(state);
        self.open.to_bits().hash(state);
        self.high.to_bits().hash(state);
        self.low.to_bits().hash(state);
        self.close.to_bits().hash(state);
        self.volume.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(bar: &MarketData) -> u64 {
        let mut hasher = DefaultHasher::new();
        bar.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_bars_hash_equal() {
        let ts = Utc::now();
        let a = MarketData::flat("BTCUSDT", ts, 100.0, 1.0);
        let b = MarketData::flat("BTCUSDT", ts, 100.0, 1.0);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn price_change_changes_hash() {
        let ts = Utc::now();
        let a = MarketData::flat("BTCUSDT", ts, 100.0, 1.0);
        let mut b = a.clone();
        b.close = 100.5;
        assert_ne!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn typical_price() {
        let mut bar = MarketData::flat("ETHUSDT", Utc::now(), 10.0, 0.0);
        bar.high = 12.0;
        bar.low = 9.0;
        bar.close = 9.0;
        assert!((bar.typical_price() - 10.0).abs() < f64::EPSILON);
    }
}
