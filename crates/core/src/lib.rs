pub mod error;
pub mod market;
pub mod signal;
pub mod strategy;

pub use error::StrategyError;
pub use market::MarketData;
pub use signal::{Signal, SignalSide};
pub use strategy::{SharedStrategy, Strategy};
