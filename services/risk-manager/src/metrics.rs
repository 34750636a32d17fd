//! VaR, CVaR, expected shortfall and drawdown over a return series

use crate::config::{RiskConfig, VarMethod};
use crate::stress::StressTestReport;
use common::stats::{self, quantile_index, tail_count};
use common::{MetricsMap, PositionSnapshot, QuantError, QuantResult, ReturnSeries, ToMetrics};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::{debug, info};

/// Risk snapshot, a pure function of its inputs and configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetricsResult {
    /// Loss threshold as a positive return fraction
    pub var: f64,
    pub cvar: f64,
    pub expected_shortfall: f64,
    pub drawdown: f64,
    /// Worst stress scenario loss in currency
    pub stress_test_loss: f64,
    pub confidence: f64,
    pub method: VarMethod,
}

impl ToMetrics for RiskMetricsResult {
    fn to_metrics(&self) -> MetricsMap {
        MetricsMap::from([
            ("var".to_string(), self.var),
            ("cvar".to_string(), self.cvar),
            ("expected_shortfall".to_string(), self.expected_shortfall),
            ("drawdown".to_string(), self.drawdown),
            ("stress_test_loss".to_string(), self.stress_test_loss),
            ("confidence".to_string(), self.confidence),
        ])
    }
}

/// Historical VaR: `-sorted[floor((1 - c) * n)]`
pub fn historical_var(returns: &ReturnSeries, confidence: f64) -> f64 {
    let sorted = stats::sorted_ascending(returns.as_slice());
    -sorted[quantile_index(1.0 - confidence, sorted.len())]
}

/// Historical CVaR: mean of every return at or below `-VaR`, negated.
///
/// The VaR order statistic itself sits in the tail, so any non-empty series
/// yields a value.
///
/// # Errors
///
/// `InsufficientTailData` if no return reaches `-VaR`.
pub fn historical_cvar(returns: &ReturnSeries, confidence: f64) -> QuantResult<f64> {
    let var = historical_var(returns, confidence);
    let tail: Vec<f64> = returns.as_slice().iter().copied().filter(|&r| r <= -var).collect();
    if tail.is_empty() {
        return Err(QuantError::InsufficientTailData {
            confidence,
            observations: returns.len(),
        });
    }
    Ok(-stats::mean(&tail)?)
}

/// Normal-fit VaR: `-(mu + sigma * inv_cdf(1 - c))`
pub fn parametric_var(returns: &ReturnSeries, confidence: f64) -> QuantResult<f64> {
    let (mu, sigma) = normal_fit(returns)?;
    Ok(-(mu + sigma * standard_normal()?.inverse_cdf(1.0 - confidence)))
}

/// Normal-fit CVaR: `-mu + sigma * pdf(inv_cdf(c)) / (1 - c)`
pub fn parametric_cvar(returns: &ReturnSeries, confidence: f64) -> QuantResult<f64> {
    let (mu, sigma) = normal_fit(returns)?;
    let normal = standard_normal()?;
    Ok(-mu + sigma * normal.pdf(normal.inverse_cdf(confidence)) / (1.0 - confidence))
}

/// Mean of the `max(1, ceil((1 - c) * n))` worst returns in `window`, negated
pub fn expected_shortfall(returns: &[f64], confidence: f64) -> QuantResult<f64> {
    let sorted = stats::sorted_ascending(returns);
    let k = tail_count(1.0 - confidence, sorted.len());
    Ok(-stats::mean(&sorted[..k])?)
}

pub(crate) fn standard_normal() -> QuantResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| QuantError::invalid("normal", e.to_string()))
}

fn normal_fit(returns: &ReturnSeries) -> QuantResult<(f64, f64)> {
    let values = returns.as_slice();
    Ok((stats::mean(values)?, stats::sample_std_dev(values)?))
}

/// Risk metrics calculator
#[derive(Debug, Clone, Default)]
pub struct RiskMetricsCalculator {
    config: RiskConfig,
}

impl RiskMetricsCalculator {
    pub fn new(config: RiskConfig) -> QuantResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// VaR with the configured method
    pub fn var(&self, returns: &ReturnSeries) -> QuantResult<f64> {
        match self.config.method {
            VarMethod::Historical => Ok(historical_var(returns, self.config.confidence)),
            VarMethod::Parametric => parametric_var(returns, self.config.confidence),
        }
    }

    /// CVaR with the configured method
    pub fn cvar(&self, returns: &ReturnSeries) -> QuantResult<f64> {
        match self.config.method {
            VarMethod::Historical => historical_cvar(returns, self.config.confidence),
            VarMethod::Parametric => parametric_cvar(returns, self.config.confidence),
        }
    }

    /// Expected shortfall over the configured window and confidence
    pub fn expected_shortfall(&self, returns: &ReturnSeries) -> QuantResult<f64> {
        let window = match self.config.expected_shortfall_window {
            Some(n) => returns.tail(n),
            None => returns.as_slice(),
        };
        expected_shortfall(window, self.config.expected_shortfall_confidence)
    }

    /// Peak-to-trough drawdown of the position's equity history, or of the
    /// path compounded from `returns` when the snapshot carries none
    pub fn drawdown(&self, returns: &ReturnSeries, position: &PositionSnapshot) -> f64 {
        if position.equity_history.is_empty() {
            stats::max_drawdown(&stats::compound(1.0, returns.as_slice()))
        } else {
            stats::max_drawdown(&position.equity_history)
        }
    }

    /// Run the configured scenario battery against `position`
    pub fn stress_test(&self, returns: &ReturnSeries, position: &PositionSnapshot) -> QuantResult<StressTestReport> {
        let values = returns.as_slice();
        let volatility = if values.len() > 1 { stats::sample_std_dev(values)? } else { 0.0 };
        let z = standard_normal()?.inverse_cdf(self.config.confidence);
        Ok(StressTestReport::run(&self.config.stress_scenarios, position, volatility, z))
    }

    /// Full risk snapshot for `returns` held as `position`.
    ///
    /// # Errors
    ///
    /// `InsufficientData` for a parametric fit over fewer than two returns.
    pub fn metrics(&self, returns: &ReturnSeries, position: &PositionSnapshot) -> QuantResult<RiskMetricsResult> {
        debug!(
            "Computing {:?} risk metrics over {} returns at {}",
            self.config.method,
            returns.len(),
            self.config.confidence
        );

        let result = RiskMetricsResult {
            var: self.var(returns)?,
            cvar: self.cvar(returns)?,
            expected_shortfall: self.expected_shortfall(returns)?,
            drawdown: self.drawdown(returns, position),
            stress_test_loss: self.stress_test(returns, position)?.max_loss,
            confidence: self.config.confidence,
            method: self.config.method,
        };

        info!(
            "Risk - VaR: {:.4}, CVaR: {:.4}, ES: {:.4}, DD: {:.2}%, stress: {:.2}",
            result.var,
            result.cvar,
            result.expected_shortfall,
            result.drawdown * 100.0,
            result.stress_test_loss
        );
        Ok(result)
    }
}
