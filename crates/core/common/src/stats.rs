//! Return-series statistics primitives
//!
//! Mean and variance go through `statrs` after explicit length checks so an
//! empty or single-point series is reported as `InsufficientData` instead of
//! leaking NaN into downstream ratios.

use crate::errors::{QuantError, QuantResult};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Trading periods per year used for annualization
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Absorbs binary representation error in `q * n` (e.g. `(1 - 0.8) * 5`).
const INDEX_EPSILON: f64 = 1e-9;

/// Arithmetic mean.
///
/// # Errors
///
/// Requires at least one value.
pub fn mean(values: &[f64]) -> QuantResult<f64> {
    if values.is_empty() {
        return Err(QuantError::insufficient("mean", 1, 0));
    }
    Ok(values.mean())
}

/// Sample variance (N - 1 denominator).
///
/// # Errors
///
/// Requires at least two values.
pub fn sample_variance(values: &[f64]) -> QuantResult<f64> {
    if values.len() < 2 {
        return Err(QuantError::insufficient("sample variance", 2, values.len()));
    }
    Ok(values.variance())
}

/// Sample standard deviation (N - 1 denominator).
///
/// # Errors
///
/// Requires at least two values.
pub fn sample_std_dev(values: &[f64]) -> QuantResult<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Copy of `values` sorted ascending
#[must_use]
pub fn sorted_ascending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// `floor(q * n)` clamped to the last valid index
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn quantile_index(q: f64, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let raw = (q * n as f64 + INDEX_EPSILON).floor().max(0.0) as usize;
    raw.min(n - 1)
}

/// `max(1, ceil(q * n))` clamped to `n`: how many observations form a `q` tail
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn tail_count(q: f64, n: usize) -> usize {
    let raw = (q * n as f64 - INDEX_EPSILON).ceil().max(1.0) as usize;
    raw.min(n)
}

/// Order statistic `sorted[floor(q * n)]` of an ascending slice.
///
/// # Errors
///
/// Requires a non-empty slice.
pub fn order_statistic(sorted: &[f64], q: f64) -> QuantResult<f64> {
    if sorted.is_empty() {
        return Err(QuantError::insufficient("order statistic", 1, 0));
    }
    Ok(sorted[quantile_index(q, sorted.len())])
}

/// `r_i = (e_i - e_{i-1}) / e_{i-1}` for every consecutive pair.
///
/// # Errors
///
/// Requires at least two points and no zero value before the last point.
pub fn simple_returns(equity: &[f64]) -> QuantResult<Vec<f64>> {
    if equity.len() < 2 {
        return Err(QuantError::insufficient("period returns", 2, equity.len()));
    }
    equity
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            if w[0] == 0.0 {
                Err(QuantError::invalid(
                    "equity",
                    format!("zero equity at index {i} leaves the next return undefined"),
                ))
            } else {
                Ok((w[1] - w[0]) / w[0])
            }
        })
        .collect()
}

/// Drawdown from the running peak at every point, as a fraction of the peak
#[must_use]
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            if peak > 0.0 { (peak - value) / peak } else { 0.0 }
        })
        .collect()
}

/// Largest peak-to-trough decline; 0 for a non-decreasing curve
#[must_use]
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdown_series(equity).into_iter().fold(0.0, f64::max)
}

/// Geometric annualization of a growth factor realised over `periods` periods
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn annualize_growth(growth: f64, periods: usize) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / periods as f64) - 1.0
}

/// Per-period volatility scaled to a yearly horizon
#[must_use]
pub fn annualize_volatility(per_period: f64) -> f64 {
    per_period * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Equity path obtained by compounding `returns` from `start`
#[must_use]
pub fn compound(start: f64, returns: &[f64]) -> Vec<f64> {
    let mut path = Vec::with_capacity(returns.len() + 1);
    let mut value = start;
    path.push(value);
    for r in returns {
        value *= 1.0 + r;
        path.push(value);
    }
    path
}

/// What a ratio returns when its denominator is zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioPolicy {
    /// `±inf` for a non-zero numerator, `0.0` when the numerator is zero too
    #[default]
    Sentinel,
    /// Raise [`QuantError::UndefinedRatio`]
    Error,
}

impl RatioPolicy {
    /// `numerator / denominator` with an explicit zero-denominator outcome.
    ///
    /// # Errors
    ///
    /// Only under [`RatioPolicy::Error`] when the denominator is zero.
    pub fn ratio(self, name: &'static str, numerator: f64, denominator: f64) -> QuantResult<f64> {
        if denominator != 0.0 {
            return Ok(numerator / denominator);
        }
        match self {
            Self::Error => Err(QuantError::UndefinedRatio { ratio: name }),
            Self::Sentinel if numerator > 0.0 => Ok(f64::INFINITY),
            Self::Sentinel if numerator < 0.0 => Ok(f64::NEG_INFINITY),
            Self::Sentinel => Ok(0.0),
        }
    }
}
