//! The strategy capability consumed by the scheduler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StrategyError;
use crate::market::MarketData;
use crate::signal::Signal;

/// A trading strategy that turns a window of market data into signals.
///
/// Implementations may perform I/O and may take arbitrarily long; callers
/// that need a bound must apply their own timeout.
///
/// # Example
/// ```ignore
/// struct AlwaysHold;
///
/// #[async_trait]
/// impl Strategy for AlwaysHold {
///     fn name(&self) -> &str { "always-hold" }
///
///     async fn generate_signals(&self, data: &[MarketData]) -> Result<Vec<Signal>, StrategyError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable identifier. Two handles with the same name are treated as the
    /// same strategy for deduplication and caching.
    fn name(&self) -> &str;

    /// Evaluate the strategy against `data` (oldest first).
    async fn generate_signals(&self, data: &[MarketData]) -> Result<Vec<Signal>, StrategyError>;
}

/// Shared handle to a strategy.
pub type SharedStrategy = Arc<dyn Strategy>;

#[async_trait]
impl<T: Strategy + ?Sized> Strategy for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate_signals(&self, data: &[MarketData]) -> Result<Vec<Signal>, StrategyError> {
        (**self).generate_signals(data).await
    }
}
