//! Core value types shared across the quant components

use crate::errors::{QuantError, QuantResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Direction of a signal or trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy / increase exposure
    Long,
    /// Sell / decrease exposure
    Short,
}

impl Side {
    /// +1 for long, -1 for short
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// One historical OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// High-low range relative to the close, `|high - low| / close`
    #[must_use]
    pub fn range_volatility(&self) -> f64 {
        (self.high - self.low).abs() / self.close
    }

    /// Reason this bar cannot be replayed, if any
    #[must_use]
    pub fn defect(&self) -> Option<&'static str> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            Some("non-finite field")
        } else if self.high < self.low {
            Some("high below low")
        } else if self.close <= 0.0 {
            Some("non-positive close")
        } else {
            None
        }
    }
}

/// Strategy output for a single bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub side: Side,
    pub size: f64,
    pub price: f64,
}

impl Signal {
    #[must_use]
    pub const fn new(side: Side, size: f64, price: f64) -> Self {
        Self { side, size, price }
    }
}

/// Executed backtest trade. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Instrument the trade was executed on
    pub instrument: String,
    pub side: Side,
    pub size: f64,
    /// Fill price after slippage
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub commission: f64,
    pub spread_cost: f64,
    /// Slippage applied to the signal price, as a fraction
    pub slippage: f64,
    /// Net P&L realized by this trade; `None` for trades that only open exposure
    pub realized_pnl: Option<f64>,
}

impl Trade {
    /// Commission plus spread cost
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.commission + self.spread_cost
    }

    /// Signed notional, positive for long
    #[must_use]
    pub fn signed_notional(&self) -> f64 {
        self.side.sign() * self.size * self.price
    }
}

/// Per-period returns in time order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ReturnSeries(Vec<f64>);

impl ReturnSeries {
    /// Wrap a return vector.
    ///
    /// # Errors
    ///
    /// Fails with [`QuantError::InsufficientData`] when empty and
    /// [`QuantError::InvalidParameter`] when a value is not finite.
    pub fn new(values: Vec<f64>) -> QuantResult<Self> {
        if values.is_empty() {
            return Err(QuantError::insufficient("return series", 1, 0));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(QuantError::invalid(
                "returns",
                format!("non-finite return at index {pos}"),
            ));
        }
        Ok(Self(values))
    }

    /// Per-period simple returns of an equity curve.
    ///
    /// # Errors
    ///
    /// Requires at least two equity points and a non-zero value before each return.
    pub fn from_equity(equity: &EquityCurve) -> QuantResult<Self> {
        Self::new(crate::stats::simple_returns(equity.as_slice())?)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most recent `n` returns (all of them if `n` exceeds the length)
    #[must_use]
    pub fn tail(&self, n: usize) -> &[f64] {
        &self.0[self.0.len().saturating_sub(n)..]
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl TryFrom<Vec<f64>> for ReturnSeries {
    type Error = QuantError;

    fn try_from(values: Vec<f64>) -> QuantResult<Self> {
        Self::new(values)
    }
}

impl From<ReturnSeries> for Vec<f64> {
    fn from(series: ReturnSeries) -> Self {
        series.0
    }
}

/// Net-worth snapshots; the first element is the starting capital
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EquityCurve(Vec<f64>);

impl EquityCurve {
    /// Wrap an equity vector.
    ///
    /// # Errors
    ///
    /// Fails when empty, or when a value is negative or not finite.
    pub fn new(values: Vec<f64>) -> QuantResult<Self> {
        if values.is_empty() {
            return Err(QuantError::insufficient("equity curve", 1, 0));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite() || *v < 0.0) {
            return Err(QuantError::invalid(
                "equity",
                format!("equity must be finite and non-negative, index {pos} is {}", values[pos]),
            ));
        }
        Ok(Self(values))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Starting capital
    #[must_use]
    pub fn initial(&self) -> f64 {
        self.0[0]
    }

    /// Latest snapshot
    #[must_use]
    pub fn last(&self) -> f64 {
        self.0[self.0.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for EquityCurve {
    type Error = QuantError;

    fn try_from(values: Vec<f64>) -> QuantResult<Self> {
        Self::new(values)
    }
}

impl From<EquityCurve> for Vec<f64> {
    fn from(curve: EquityCurve) -> Self {
        curve.0
    }
}

/// Asset identifier to weight. Ordered so every consumer iterates deterministically.
pub type PortfolioWeights = BTreeMap<String, f64>;

/// Read-only view of the holdings owned by the external portfolio tracker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Asset identifier to signed notional (negative = short)
    pub holdings: BTreeMap<String, f64>,
    /// Historical equity of the position, oldest first. May be empty.
    #[serde(default)]
    pub equity_history: Vec<f64>,
}

impl PositionSnapshot {
    #[must_use]
    pub fn new(holdings: BTreeMap<String, f64>) -> Self {
        Self {
            holdings,
            equity_history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_equity_history(mut self, history: Vec<f64>) -> Self {
        self.equity_history = history;
        self
    }

    /// Sum of absolute notionals
    #[must_use]
    pub fn gross_exposure(&self) -> f64 {
        self.holdings.values().map(|n| n.abs()).sum()
    }

    /// Sum of signed notionals
    #[must_use]
    pub fn net_exposure(&self) -> f64 {
        self.holdings.values().sum()
    }
}
