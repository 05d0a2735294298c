use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction a strategy recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSide {
    Buy,
    Sell,
    Hold,
}

/// A trading signal produced by a strategy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Name of the strategy that produced the signal.
    pub strategy: String,
    pub symbol: String,
    pub side: SignalSide,
    /// Reference price at which the signal was generated.
    pub price: f64,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        side: SignalSide,
        price: f64,
        confidence: f64,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            symbol: symbol.into(),
            side,
            price,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.side != SignalSide::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        let s = Signal::new("s", "BTCUSDT", SignalSide::Buy, 1.0, 1.7);
        assert_eq!(s.confidence, 1.0);
        let s = Signal::new("s", "BTCUSDT", SignalSide::Sell, 1.0, -0.2);
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn hold_is_not_actionable() {
        assert!(!Signal::new("s", "X", SignalSide::Hold, 1.0, 0.5).is_actionable());
        assert!(Signal::new("s", "X", SignalSide::Buy, 1.0, 0.5).is_actionable());
    }
}
