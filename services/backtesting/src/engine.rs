//! Backtest replay loop
//!
//! Each instrument is replayed strictly in timestamp order. Sequential runs
//! share one cash account across instruments; concurrent runs give every
//! instrument its own slice of capital and merge the streams afterwards.

use crate::config::BacktestConfig;
use crate::market_data::{HistoricalDataProvider, prepare_bars};
use crate::performance::{PerformanceAnalyzer, PerformanceMetrics};
use crate::portfolio::PortfolioTracker;
use crate::strategy::Strategy;
use crate::execution::fill_price;
use common::{Bar, CancellationFlag, EquityCurve, QuantError, QuantResult, Signal, Trade};
use futures::future::join_all;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Trades and equity produced by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// Starts at the initial capital
    pub equity: Vec<f64>,
    pub metrics: Option<PerformanceMetrics>,
}

impl BacktestResult {
    /// Equity as a validated curve
    pub fn equity_curve(&self) -> QuantResult<EquityCurve> {
        EquityCurve::new(self.equity.clone())
    }
}

/// Backtesting engine for strategy evaluation
pub struct BacktestEngine<P> {
    config: BacktestConfig,
    provider: P,
    analyzer: PerformanceAnalyzer,
}

impl<P: HistoricalDataProvider> BacktestEngine<P> {
    pub fn new(config: BacktestConfig, provider: P) -> QuantResult<Self> {
        config.validate()?;
        info!(
            "Initializing BacktestEngine: capital {}, window {} to {}",
            config.initial_capital, config.start_date, config.end_date
        );
        let analyzer = PerformanceAnalyzer::new(config.performance)?;
        Ok(Self {
            config,
            provider,
            analyzer,
        })
    }

    pub const fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replay `instruments` one after another with a single strategy instance
    pub async fn run<S, I>(&self, instruments: &[I], strategy: &mut S) -> QuantResult<BacktestResult>
    where
        S: Strategy,
        I: AsRef<str> + Sync,
    {
        self.run_with_cancel(instruments, strategy, &CancellationFlag::new()).await
    }

    /// [`run`](Self::run) that stops between bars once `cancel` is set.
    ///
    /// A cancelled run returns `Cancelled` and nothing accumulated so far.
    pub async fn run_with_cancel<S, I>(
        &self,
        instruments: &[I],
        strategy: &mut S,
        cancel: &CancellationFlag,
    ) -> QuantResult<BacktestResult>
    where
        S: Strategy,
        I: AsRef<str> + Sync,
    {
        info!("Starting backtest over {} instruments", instruments.len());
        let mut ledger = Ledger::new(self.config.initial_capital);

        for instrument in instruments {
            let instrument = instrument.as_ref();
            cancel.check()?;
            if let Some(bars) = self.load_bars(instrument).await? {
                replay(&self.config, instrument, &bars, strategy, &mut ledger, cancel)?;
            }
        }

        let result = ledger.finish();
        info!("Backtest complete: {} trades, {} equity points", result.trades.len(), result.equity.len());
        Ok(result)
    }

    /// Fetch every instrument concurrently, then replay each on its own with
    /// a fresh strategy from `strategy_factory` and `initial_capital / n`.
    ///
    /// Trades are concatenated in instrument order; equity curves are summed
    /// by event index, a finished stream holding its last value. The replay
    /// runs on the rayon pool from a blocking task, off the async workers.
    pub async fn run_concurrent<S, I, F>(&self, instruments: &[I], strategy_factory: F) -> QuantResult<BacktestResult>
    where
        S: Strategy + 'static,
        I: AsRef<str> + Sync,
        F: Fn(&str) -> S + Send + Sync,
    {
        self.run_concurrent_with_cancel(instruments, strategy_factory, &CancellationFlag::new())
            .await
    }

    #[allow(clippy::cast_precision_loss)]
    pub async fn run_concurrent_with_cancel<S, I, F>(
        &self,
        instruments: &[I],
        strategy_factory: F,
        cancel: &CancellationFlag,
    ) -> QuantResult<BacktestResult>
    where
        S: Strategy + 'static,
        I: AsRef<str> + Sync,
        F: Fn(&str) -> S + Send + Sync,
    {
        if instruments.is_empty() {
            return Ok(Ledger::new(self.config.initial_capital).finish());
        }
        info!("Starting concurrent backtest over {} instruments", instruments.len());

        let fetched = join_all(instruments.iter().map(|i| self.load_bars(i.as_ref()))).await;
        let bar_sets = fetched.into_iter().collect::<QuantResult<Vec<_>>>()?;
        cancel.check()?;

        let jobs: Vec<(String, Option<(Vec<Bar>, S)>)> = instruments
            .iter()
            .zip(bar_sets)
            .map(|(instrument, bars)| {
                let instrument = instrument.as_ref();
                let job = bars.map(|bars| (bars, strategy_factory(instrument)));
                (instrument.to_string(), job)
            })
            .collect();

        let config = self.config.clone();
        let capital = config.initial_capital / instruments.len() as f64;
        let cancel = cancel.clone();

        let replayed = tokio::task::spawn_blocking(move || {
            jobs.into_par_iter()
                .map(|(instrument, job)| {
                    let mut ledger = Ledger::new(capital);
                    if let Some((bars, mut strategy)) = job {
                        replay(&config, &instrument, &bars, &mut strategy, &mut ledger, &cancel)?;
                    }
                    Ok(ledger.finish())
                })
                .collect::<QuantResult<Vec<_>>>()
        })
        .await;

        let streams = match replayed {
            Ok(streams) => streams?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => return Err(QuantError::Cancelled),
        };

        let result = merge_streams(streams);
        info!(
            "Concurrent backtest complete: {} trades, {} equity points",
            result.trades.len(),
            result.equity.len()
        );
        Ok(result)
    }

    /// [`run`](Self::run) followed by performance analysis.
    ///
    /// Metrics stay `None` when the run produced fewer than two equity points.
    pub async fn run_and_analyze<S, I>(&self, instruments: &[I], strategy: &mut S) -> QuantResult<BacktestResult>
    where
        S: Strategy,
        I: AsRef<str> + Sync,
    {
        let mut result = self.run(instruments, strategy).await?;
        result.metrics = self.analyze(&result)?;
        Ok(result)
    }

    /// Performance metrics for a finished run
    pub fn analyze(&self, result: &BacktestResult) -> QuantResult<Option<PerformanceMetrics>> {
        if result.equity.len() < 2 {
            warn!("Run produced {} equity points, skipping performance analysis", result.equity.len());
            return Ok(None);
        }
        let equity = result.equity_curve()?;
        self.analyzer.metrics(&equity, &result.trades).map(Some)
    }

    /// `None` when the provider has no coverage for the window
    async fn load_bars(&self, instrument: &str) -> QuantResult<Option<Vec<Bar>>> {
        match self
            .provider
            .fetch_bars(instrument, self.config.start_date, self.config.end_date)
            .await
        {
            Ok(bars) => prepare_bars(instrument, bars, self.config.start_date, self.config.end_date).map(Some),
            Err(QuantError::DataUnavailable { reason, .. }) => {
                warn!("No data for {}: {}, contributing zero trades", instrument, reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Trade log and equity stream being accumulated
struct Ledger {
    tracker: PortfolioTracker,
    trades: Vec<Trade>,
    equity: Vec<f64>,
}

impl Ledger {
    fn new(capital: f64) -> Self {
        Self {
            tracker: PortfolioTracker::new(capital),
            trades: Vec::new(),
            equity: vec![capital],
        }
    }

    fn finish(self) -> BacktestResult {
        BacktestResult {
            trades: self.trades,
            equity: self.equity,
            metrics: None,
        }
    }
}

fn replay<S: Strategy + ?Sized>(
    config: &BacktestConfig,
    instrument: &str,
    bars: &[Bar],
    strategy: &mut S,
    ledger: &mut Ledger,
    cancel: &CancellationFlag,
) -> QuantResult<()> {
    let costs = config.costs();
    debug!("Replaying {} bars for {}", bars.len(), instrument);

    for bar in bars {
        cancel.check()?;
        ledger.tracker.mark(instrument, bar.close);

        let signal = strategy
            .analyze(bar)
            .and_then(|signal| signal.map(validate_signal).transpose())
            .map_err(|source| QuantError::Strategy {
                instrument: instrument.to_string(),
                source,
            })?;

        if let Some(signal) = signal {
            let slippage = config.slippage_model.estimate(signal.size, bar, config.max_slippage);
            let mut trade = Trade {
                instrument: instrument.to_string(),
                side: signal.side,
                size: signal.size,
                price: fill_price(signal.side, signal.price, slippage),
                timestamp: bar.timestamp,
                commission: costs.commission(signal.size),
                spread_cost: costs.spread_cost(signal.price),
                slippage,
                realized_pnl: None,
            };
            trade.realized_pnl = ledger.tracker.apply(&trade);
            debug!(
                "{} {} {} @ {:.4} (slippage {:.5}, realized {:?})",
                instrument, trade.side, trade.size, trade.price, slippage, trade.realized_pnl
            );
            ledger.trades.push(trade);

            if !config.record_every_bar {
                ledger.equity.push(ledger.tracker.equity());
            }
        }

        if config.record_every_bar {
            ledger.equity.push(ledger.tracker.equity());
        }
    }
    Ok(())
}

fn validate_signal(signal: Signal) -> anyhow::Result<Signal> {
    if !(signal.size.is_finite() && signal.size > 0.0) {
        anyhow::bail!("signal size must be positive, got {}", signal.size);
    }
    if !(signal.price.is_finite() && signal.price > 0.0) {
        anyhow::bail!("signal price must be positive, got {}", signal.price);
    }
    Ok(signal)
}

fn merge_streams(streams: Vec<BacktestResult>) -> BacktestResult {
    let length = streams.iter().map(|s| s.equity.len()).max().unwrap_or(0);
    let equity = (0..length)
        .map(|i| {
            streams
                .iter()
                .filter_map(|s| s.equity.get(i).or_else(|| s.equity.last()))
                .sum()
        })
        .collect();
    let trades = streams.into_iter().flat_map(|s| s.trades).collect();

    BacktestResult {
        trades,
        equity,
        metrics: None,
    }
}
