//! Simple Moving Average Crossover Strategy Example
//!
//! Replays synthetic daily bars for three instruments, then feeds the
//! results through performance, risk, Monte Carlo and allocation analysis.
//!
//! ```text
//! RUST_LOG=info cargo run -p backtesting --example simple_ma_strategy
//! ```

use async_trait::async_trait;
use backtesting::{BacktestConfig, BacktestEngine, HistoricalDataProvider, SlippageModel, Strategy};
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{
    Bar, EquityCurve, PositionSnapshot, QuantError, QuantResult, ReturnSeries, Side, Signal, TelemetryTags,
    TracingSink, publish,
};
use portfolio_manager::{AssetReturns, InvestorViews, MarketPriors, PortfolioOptimizer, weights_from_positions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use risk_manager::RiskMetricsCalculator;
use sim::{MonteCarloConfig, MonteCarloSimulator};
use std::collections::{BTreeMap, VecDeque};
use tracing::info;
use tracing_subscriber::EnvFilter;

const INSTRUMENTS: [&str; 3] = ["AAPL", "MSFT", "TSLA"];

/// Random-walk bars with a per-instrument drift
struct SyntheticProvider {
    days: usize,
}

#[async_trait]
impl HistoricalDataProvider for SyntheticProvider {
    async fn fetch_bars(&self, instrument: &str, _start: DateTime<Utc>, _end: DateTime<Utc>) -> QuantResult<Vec<Bar>> {
        let index = INSTRUMENTS
            .iter()
            .position(|i| *i == instrument)
            .ok_or_else(|| QuantError::DataUnavailable {
                instrument: instrument.to_string(),
                reason: "not generated".to_string(),
            })?;

        let mut rng = StdRng::seed_from_u64(7 + index as u64);
        let drift = 0.0002 * (index as f64 + 1.0);
        let start = Utc
            .with_ymd_and_hms(2023, 1, 2, 0, 0, 0)
            .single()
            .ok_or_else(|| QuantError::invalid("start", "ambiguous start date"))?;
        let mut close = 100.0;

        Ok((0..self.days)
            .map(|day| {
                close *= 1.0 + drift + rng.gen_range(-0.02..0.02);
                Bar {
                    timestamp: start + Duration::days(day as i64),
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 2_000_000.0,
                }
            })
            .collect())
    }
}

/// Moving average crossover, flat or long a fixed quantity
struct MAStrategy {
    fast_period: usize,
    slow_period: usize,
    quantity: f64,
    price_history: VecDeque<f64>,
    long: bool,
}

impl MAStrategy {
    fn new(fast_period: usize, slow_period: usize, quantity: f64) -> Self {
        Self {
            fast_period,
            slow_period,
            quantity,
            price_history: VecDeque::with_capacity(slow_period),
            long: false,
        }
    }

    fn calculate_ma(&self, period: usize) -> f64 {
        self.price_history.iter().rev().take(period).sum::<f64>() / period as f64
    }
}

impl Strategy for MAStrategy {
    fn analyze(&mut self, bar: &Bar) -> anyhow::Result<Option<Signal>> {
        self.price_history.push_back(bar.close);
        if self.price_history.len() > self.slow_period {
            self.price_history.pop_front();
        }
        if self.price_history.len() < self.slow_period {
            return Ok(None);
        }

        let bullish = self.calculate_ma(self.fast_period) > self.calculate_ma(self.slow_period);
        let signal = match (bullish, self.long) {
            (true, false) => Some(Signal::new(Side::Long, self.quantity, bar.close)),
            (false, true) => Some(Signal::new(Side::Short, self.quantity, bar.close)),
            _ => None,
        };
        if signal.is_some() {
            self.long = bullish;
        }
        Ok(signal)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let provider = SyntheticProvider { days: 500 };
    let config = BacktestConfig {
        initial_capital: 300_000.0,
        slippage_model: SlippageModel::SquareRootImpact { volatility_factor: 1.0 },
        record_every_bar: true,
        ..BacktestConfig::default()
    };
    let engine = BacktestEngine::new(config, provider)?;

    let result = engine
        .run_concurrent(&INSTRUMENTS, |_| MAStrategy::new(10, 30, 200.0))
        .await?;
    let sink = TracingSink;
    let tags = TelemetryTags {
        strategy: "ma_crossover".to_string(),
        symbol: INSTRUMENTS.join(","),
        timeframe: "1d".to_string(),
    };

    if let Some(metrics) = engine.analyze(&result)? {
        info!(
            "Return {:.2}%, Sharpe {:.2}, max DD {:.2}%, {} trades",
            metrics.total_return * 100.0,
            metrics.sharpe_ratio,
            metrics.max_drawdown * 100.0,
            metrics.total_trades
        );
        publish(&sink, "backtest_performance", &tags, &metrics);
    }

    // Risk of the combined equity curve against the final book
    let curve: EquityCurve = result.equity_curve()?;
    let returns = ReturnSeries::from_equity(&curve)?;
    let mut quantities: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for trade in &result.trades {
        let entry = quantities.entry(trade.instrument.clone()).or_insert((0.0, 0.0));
        entry.0 += trade.side.sign() * trade.size;
        entry.1 = trade.price;
    }
    let book = quantities
        .into_iter()
        .map(|(instrument, (quantity, price))| (instrument, quantity * price))
        .collect();
    let position = PositionSnapshot::new(book).with_equity_history(curve.into());

    let risk = RiskMetricsCalculator::default().metrics(&returns, &position)?;
    publish(&sink, "risk_metrics", &tags, &risk);

    let simulator = MonteCarloSimulator::new(MonteCarloConfig {
        iterations: 2_000,
        ..MonteCarloConfig::default()
    })?;
    let summary = simulator.simulate(&returns, &mut StdRng::seed_from_u64(42))?;
    publish(&sink, "monte_carlo", &tags, &summary);

    // Allocation across the instruments' close-to-close returns
    let mut asset_returns = AssetReturns::new();
    for instrument in INSTRUMENTS {
        let bars = SyntheticProvider { days: 500 }
            .fetch_bars(instrument, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
            .await?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        asset_returns.insert(instrument.to_string(), common::stats::simple_returns(&closes)?);
    }
    let market_weights = INSTRUMENTS.iter().map(|i| (i.to_string(), 1.0 / 3.0)).collect();
    let priors = MarketPriors::Implied {
        market_weights,
        risk_aversion: 2.5,
    };
    let plan = PortfolioOptimizer::default().plan(
        &asset_returns,
        &priors,
        &InvestorViews::none(INSTRUMENTS.len()),
        &weights_from_positions(&position),
    )?;

    let portfolio_value = position.equity_history.last().copied().unwrap_or(0.0);
    info!("Target weights: {:?}", plan.target_weights);
    for trade in &plan.trades {
        info!(
            "{} {} {:.4} -> {:.4} ({:.0})",
            trade.side,
            trade.asset,
            trade.from_weight,
            trade.to_weight,
            trade.notional(portfolio_value)
        );
    }
    Ok(())
}
