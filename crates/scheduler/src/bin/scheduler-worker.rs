//! scheduler-worker: runs the strategy execution scheduler against a
//! synthetic market feed.
//!
//! Each feed interval appends one bar per symbol and submits a momentum
//! evaluation for it. Scheduler events are logged as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Defaults plus SCHEDULER_* env overrides
//! scheduler-worker
//!
//! # Explicit config, two symbols, stop after a minute
//! scheduler-worker --config scheduler.toml --symbols BTCUSDT,ETHUSDT --run-for-secs 60
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tradebot_core::{MarketData, Signal, SignalSide, Strategy, StrategyError};
use tradebot_scheduler::config::load_dotenv;
use tradebot_scheduler::{ExecutionManager, Priority, SchedulerConfig, SchedulerError, SchedulerEvent};

/// Run the strategy scheduler against a synthetic market feed.
#[derive(Parser, Debug)]
#[command(name = "scheduler-worker", version, about)]
struct Cli {
    /// TOML config file. Without it, defaults plus SCHEDULER_* overrides apply.
    #[arg(long, env = "SCHEDULER_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated symbols to feed.
    #[arg(long, env = "SCHEDULER_SYMBOLS", value_delimiter = ',', default_value = "BTCUSDT,ETHUSDT,SOLUSDT")]
    symbols: Vec<String>,

    /// Milliseconds between synthetic bars.
    #[arg(long, env = "SCHEDULER_FEED_INTERVAL_MS", default_value_t = 500)]
    feed_interval_ms: u64,

    /// Stop after this many seconds (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    run_for_secs: u64,
}

/// Bars kept per symbol and handed to each evaluation.
const FEED_WINDOW: usize = 50;

/// Moving-average crossover on typical price.
struct Momentum {
    name: String,
    fast: usize,
    slow: usize,
}

impl Momentum {
    fn new(fast: usize, slow: usize) -> Self {
        Self {
            name: format!("momentum-{fast}-{slow}"),
            fast,
            slow,
        }
    }
}

fn sma(bars: &[MarketData]) -> f64 {
    bars.iter().map(MarketData::typical_price).sum::<f64>() / bars.len() as f64
}

#[async_trait]
impl Strategy for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_signals(&self, data: &[MarketData]) -> Result<Vec<Signal>, StrategyError> {
        if data.len() < self.slow {
            return Err(StrategyError::InsufficientData {
                needed: self.slow,
                got: data.len(),
            });
        }
        let last = &data[data.len() - 1];
        let fast = sma(&data[data.len() - self.fast..]);
        let slow = sma(&data[data.len() - self.slow..]);
        let spread = (fast - slow) / slow;

        let side = if spread > 0.001 {
            SignalSide::Buy
        } else if spread < -0.001 {
            SignalSide::Sell
        } else {
            SignalSide::Hold
        };
        let confidence = (spread.abs() * 100.0).min(1.0);
        Ok(vec![Signal::new(&self.name, &last.symbol, side, last.close, confidence)])
    }
}

fn load_config(cli: &Cli) -> Result<SchedulerConfig, SchedulerError> {
    match &cli.config {
        Some(path) => SchedulerConfig::from_file(path),
        None => {
            let mut config = SchedulerConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Next synthetic close for a symbol: a sine wave around a per-symbol base.
fn synthetic_close(symbol_index: usize, step: u64) -> f64 {
    let base = 100.0 * (symbol_index as f64 + 1.0);
    let phase = step as f64 / 12.0 + symbol_index as f64;
    base * (1.0 + 0.02 * phase.sin())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(?cli, "starting scheduler-worker");

    let config = load_config(&cli).context("failed to load scheduler config")?;
    config.log_summary();

    let manager = ExecutionManager::new(config).context("failed to build execution manager")?;
    spawn_event_logger(&manager);
    manager.start()?;

    let momentum = Momentum::new(5, 20);
    // Evaluations before this many bars can only fail, so they are not submitted.
    let warmup = momentum.slow;
    let strategy: Arc<dyn Strategy> = Arc::new(momentum);
    let mut history: HashMap<String, Vec<MarketData>> = HashMap::new();
    let mut feed = tokio::time::interval(Duration::from_millis(cli.feed_interval_ms.max(1)));
    let deadline = async {
        if cli.run_for_secs > 0 {
            tokio::time::sleep(Duration::from_secs(cli.run_for_secs)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(deadline);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut step: u64 = 0;
    loop {
        tokio::select! {
            _ = feed.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            _ = &mut deadline => {
                tracing::info!(secs = cli.run_for_secs, "run time elapsed");
                break;
            }
        }

        for (i, symbol) in cli.symbols.iter().enumerate() {
            let bars = history.entry(symbol.clone()).or_default();
            let close = synthetic_close(i, step);
            bars.push(MarketData::flat(symbol.as_str(), Utc::now(), close, 1_000.0));
            if bars.len() > FEED_WINDOW {
                bars.remove(0);
            }
            if bars.len() < warmup {
                continue;
            }

            let priority = match step % 3 {
                0 => Priority::High,
                1 => Priority::Medium,
                _ => Priority::Low,
            };
            match manager.add_task(Arc::clone(&strategy), bars.clone(), priority, 2) {
                Ok(_) => {}
                Err(e @ (SchedulerError::Duplicate { .. } | SchedulerError::QueueFull { .. })) => {
                    tracing::debug!(symbol = %symbol, "submission rejected: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        step += 1;
    }

    let report = manager.stop().await;
    let metrics = manager.get_metrics();
    tracing::info!(
        drained = report.drained,
        submitted = metrics.total_submitted,
        succeeded = metrics.total_succeeded,
        failed = metrics.total_failed,
        retried = metrics.total_retried,
        cache_hits = metrics.total_cache_hits,
        "scheduler-worker exited"
    );
    Ok(())
}

fn spawn_event_logger(manager: &ExecutionManager) {
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SchedulerEvent::ExecutionSuccess(result)) => {
                    for signal in result.signals.iter().filter(|s| s.is_actionable()) {
                        tracing::info!(
                            symbol = %signal.symbol,
                            side = ?signal.side,
                            price = signal.price,
                            confidence = signal.confidence,
                            cached = result.from_cache,
                            "signal"
                        );
                    }
                }
                Ok(SchedulerEvent::MetricsUpdated(m)) => {
                    tracing::info!(
                        cpu = m.cpu_usage,
                        memory = m.memory_usage,
                        active = m.active_tasks,
                        queued = m.queued_tasks,
                        throughput = m.throughput,
                        cache_hit_ratio = m.cache_hit_ratio,
                        "metrics"
                    );
                }
                Ok(event) => tracing::debug!(event = event.name(), "scheduler event"),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<MarketData> {
        (0..n)
            .map(|i| MarketData::flat("BTCUSDT", Utc::now(), 100.0 + i as f64, 1.0))
            .collect()
    }

    #[tokio::test]
    async fn momentum_needs_exactly_the_warmup_window() {
        let momentum = Momentum::new(5, 20);
        let short = momentum.generate_signals(&rising(momentum.slow - 1)).await;
        assert!(matches!(short, Err(StrategyError::InsufficientData { needed: 20, got: 19 })));

        let signals = momentum.generate_signals(&rising(momentum.slow)).await.unwrap();
        assert_eq!(signals[0].side, SignalSide::Buy);
    }

    #[test]
    fn sma_uses_typical_price() {
        let mut bar = MarketData::flat("X", Utc::now(), 10.0, 1.0);
        bar.high = 13.0;
        bar.low = 7.0;
        bar.close = 11.0;
        assert!((sma(&[bar]) - 31.0 / 3.0).abs() < 1e-9);
    }
}
