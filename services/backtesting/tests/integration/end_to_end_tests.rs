//! End-to-end integration tests for complete backtesting workflows

use crate::test_utils::*;
use approx::assert_relative_eq;
use backtesting::*;
use common::{Bar, Signal, TelemetryTags, publish};
use rstest::*;
use std::collections::VecDeque;

/// Crossover of two simple moving averages, always trading `size` units
struct CrossoverStrategy {
    fast: usize,
    slow: usize,
    size: f64,
    closes: VecDeque<f64>,
    long: bool,
}

impl CrossoverStrategy {
    fn new(fast: usize, slow: usize, size: f64) -> Self {
        Self {
            fast,
            slow,
            size,
            closes: VecDeque::with_capacity(slow),
            long: false,
        }
    }

    fn average(&self, n: usize) -> f64 {
        self.closes.iter().rev().take(n).sum::<f64>() / n as f64
    }
}

impl Strategy for CrossoverStrategy {
    fn analyze(&mut self, bar: &Bar) -> anyhow::Result<Option<Signal>> {
        self.closes.push_back(bar.close);
        if self.closes.len() > self.slow {
            self.closes.pop_front();
        }
        if self.closes.len() < self.slow {
            return Ok(None);
        }

        let fast_above = self.average(self.fast) > self.average(self.slow);
        match (fast_above, self.long) {
            (true, false) => {
                self.long = true;
                Ok(Some(long(self.size, bar.close)))
            }
            (false, true) => {
                self.long = false;
                Ok(Some(short(self.size, bar.close)))
            }
            _ => Ok(None),
        }
    }
}

#[rstest]
#[tokio::test]
async fn test_complete_backtest_round_trip_market() {
    init_test_logging();
    let bars = BarFactory::new().round_trip(60, 100.0, 1.0);
    let engine = BacktestEngine::new(
        TestConfigFactory::basic_config(),
        InMemoryProvider::new().with_bars("TREND", bars),
    )
    .unwrap();

    let result = engine
        .run_and_analyze(&["TREND"], &mut CrossoverStrategy::new(3, 8, 100.0))
        .await
        .unwrap();

    // one entry on the way up, one exit on the way down
    assert_eq!(result.trades.len(), 2);
    assert!(result.trades[0].realized_pnl.is_none());
    assert!(result.trades[1].realized_pnl.is_some());

    let metrics = result.metrics.as_ref().unwrap();
    assert_eq!(metrics.total_trades, 2);
    let equity = result.equity_curve().unwrap();
    assert_relative_eq!(metrics.total_return, equity.last() / equity.initial() - 1.0, epsilon = 1e-12);
    assert_in_range(metrics.max_drawdown, 0.0, 1.0);
    assert!(metrics.total_commission > 0.0);
}

#[rstest]
#[tokio::test]
async fn test_metrics_published_to_sink() {
    let bars = BarFactory::new().round_trip(40, 50.0, 0.5);
    let engine = BacktestEngine::new(
        TestConfigFactory::basic_config(),
        InMemoryProvider::new().with_bars("ETH", bars),
    )
    .unwrap();
    let result = engine
        .run_and_analyze(&["ETH"], &mut CrossoverStrategy::new(2, 5, 10.0))
        .await
        .unwrap();

    let sink = RecordingSink::new();
    let tags = TelemetryTags {
        strategy: "sma_crossover".to_string(),
        symbol: "ETH".to_string(),
        timeframe: "1d".to_string(),
    };
    publish(&sink, "performance", &tags, result.metrics.as_ref().unwrap());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tags, tags);
    assert!(records[0].fields.contains_key("sharpe"));
}

#[rstest]
#[tokio::test]
async fn test_sink_failure_does_not_affect_result() {
    let engine = BacktestEngine::new(
        TestConfigFactory::frictionless_config(1_000.0),
        InMemoryProvider::new().with_bars("X", BarFactory::new().round_trip(30, 20.0, 0.5)),
    )
    .unwrap();
    let result = engine
        .run_and_analyze(&["X"], &mut CrossoverStrategy::new(2, 4, 5.0))
        .await
        .unwrap();

    let sink = FailingSink::new();
    publish(&sink, "performance", &TelemetryTags::default(), result.metrics.as_ref().unwrap());

    assert_eq!(sink.attempts(), 1);
}

#[rstest]
#[tokio::test]
async fn test_config_loaded_from_file() {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
initial_capital = 25000.0
commission_rate = 0.002
record_every_bar = true

[slippage_model]
model = "fixed"
bps = 3.0

[performance]
risk_free_rate = 0.01
ratio_policy = "error"
"#
    )
    .unwrap();

    let config = BacktestConfig::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.initial_capital, 25_000.0);
    assert_eq!(config.commission_rate, 0.002);
    assert!(config.record_every_bar);
    assert_eq!(config.slippage_model, SlippageModel::Fixed { bps: 3.0 });
    assert_eq!(config.performance.ratio_policy, common::RatioPolicy::Error);
    assert_eq!(config.spread_rate, BacktestConfig::default().spread_rate);
}
