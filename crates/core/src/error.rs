use thiserror::Error;

/// Errors a strategy may return from signal generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("strategy failed: {0}")]
    Failed(String),

    #[error("insufficient market data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}
