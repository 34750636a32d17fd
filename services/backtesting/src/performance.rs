//! Performance analysis over an equity curve and trade log
//!
//! Every ratio with a possibly zero denominator goes through the configured
//! [`RatioPolicy`], so a flat or loss-free run yields a documented sentinel
//! (or an explicit error) instead of NaN.

use common::stats::{self, TRADING_DAYS_PER_YEAR};
use common::{EquityCurve, MetricsMap, QuantError, QuantResult, RatioPolicy, ToMetrics, Trade};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Analyzer settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Annual risk-free rate, subtracted per period from Sharpe and Sortino numerators
    pub risk_free_rate: f64,
    pub ratio_policy: RatioPolicy,
}

impl PerformanceConfig {
    pub fn validate(&self) -> QuantResult<()> {
        if self.risk_free_rate.is_finite() {
            Ok(())
        } else {
            Err(QuantError::invalid("risk_free_rate", "must be finite"))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Returns
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Risk
    pub max_drawdown: f64,

    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,

    // Execution costs
    pub total_commission: f64,
    pub total_spread_cost: f64,
}

impl ToMetrics for PerformanceMetrics {
    #[allow(clippy::cast_precision_loss)]
    fn to_metrics(&self) -> MetricsMap {
        MetricsMap::from([
            ("total_return".to_string(), self.total_return),
            ("annualized_return".to_string(), self.annualized_return),
            ("volatility".to_string(), self.volatility),
            ("sharpe".to_string(), self.sharpe_ratio),
            ("sortino".to_string(), self.sortino_ratio),
            ("calmar".to_string(), self.calmar_ratio),
            ("max_drawdown".to_string(), self.max_drawdown),
            ("total_trades".to_string(), self.total_trades as f64),
            ("win_rate".to_string(), self.win_rate),
            ("profit_factor".to_string(), self.profit_factor),
            ("expectancy".to_string(), self.expectancy),
            ("total_commission".to_string(), self.total_commission),
            ("total_spread_cost".to_string(), self.total_spread_cost),
        ])
    }
}

/// Performance analyzer for strategy metrics
#[derive(Debug, Clone, Default)]
pub struct PerformanceAnalyzer {
    config: PerformanceConfig,
}

impl PerformanceAnalyzer {
    pub fn new(config: PerformanceConfig) -> QuantResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    /// Derive return, risk and trade statistics.
    ///
    /// # Errors
    ///
    /// `InsufficientData` for fewer than two equity points; `UndefinedRatio`
    /// only under [`RatioPolicy::Error`].
    #[allow(clippy::cast_precision_loss)]
    pub fn metrics(&self, equity: &EquityCurve, trades: &[Trade]) -> QuantResult<PerformanceMetrics> {
        let returns = stats::simple_returns(equity.as_slice())?;
        let policy = self.config.ratio_policy;
        let annualizer = TRADING_DAYS_PER_YEAR.sqrt();
        let period_rf = self.config.risk_free_rate / TRADING_DAYS_PER_YEAR;

        let excess_mean = stats::mean(&returns)? - period_rf;
        // a single return has no dispersion estimate; treat it as zero
        let std_dev = if returns.len() > 1 { stats::sample_std_dev(&returns)? } else { 0.0 };
        let sharpe_ratio = policy.ratio("sharpe", excess_mean, std_dev)? * annualizer;
        let sortino_ratio = policy.ratio("sortino", excess_mean, downside_deviation(&returns))?;

        let max_drawdown = stats::max_drawdown(equity.as_slice());
        let growth = equity.last() / equity.initial();
        let annualized_return = stats::annualize_growth(growth, returns.len());
        let calmar_ratio = policy.ratio("calmar", annualized_return, max_drawdown)?;

        debug!(
            "Return statistics - periods: {}, mean excess: {:.6}, std: {:.6}",
            returns.len(),
            excess_mean,
            std_dev
        );

        let closed: Vec<f64> = trades.iter().filter_map(|t| t.realized_pnl).collect();
        let wins: Vec<f64> = closed.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = closed.iter().copied().filter(|&p| p < 0.0).map(f64::abs).collect();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum();

        let metrics = PerformanceMetrics {
            total_return: growth - 1.0,
            annualized_return,
            volatility: stats::annualize_volatility(std_dev),
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: fraction(wins.len(), closed.len()),
            average_win: average(gross_profit, wins.len()),
            average_loss: average(gross_loss, losses.len()),
            profit_factor: policy.ratio("profit_factor", gross_profit, gross_loss)?,
            expectancy: average(closed.iter().sum(), closed.len()),
            total_commission: trades.iter().map(|t| t.commission).sum(),
            total_spread_cost: trades.iter().map(|t| t.spread_cost).sum(),
        };

        info!(
            "Performance - Return: {:.2}%, Sharpe: {:.2}, Max DD: {:.2}%, Win rate: {:.1}%",
            metrics.total_return * 100.0,
            metrics.sharpe_ratio,
            metrics.max_drawdown * 100.0,
            metrics.win_rate * 100.0
        );
        Ok(metrics)
    }
}

/// Root mean square of the strictly negative returns; 0 when there are none
fn downside_deviation(returns: &[f64]) -> f64 {
    let squares: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();
    stats::mean(&squares).map_or(0.0, f64::sqrt)
}

#[allow(clippy::cast_precision_loss)]
fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

#[allow(clippy::cast_precision_loss)]
fn average(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}
