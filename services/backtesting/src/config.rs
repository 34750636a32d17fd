//! Backtest configuration

use crate::execution::{SlippageModel, TransactionCosts};
use crate::performance::PerformanceConfig;
use chrono::{DateTime, Utc};
use common::{QuantError, QuantResult, load_config};
use serde::{Deserialize, Serialize};

/// Configuration for backtesting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_capital: f64,
    pub commission_rate: f64, // per unit of size
    pub spread_rate: f64,     // fraction of the signal price
    pub slippage_model: SlippageModel,
    /// Upper bound applied to every slippage estimate
    pub max_slippage: f64,
    /// Append equity after every bar instead of after every trade
    pub record_every_bar: bool,
    pub performance: PerformanceConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start_date: DateTime::<Utc>::MIN_UTC,
            end_date: DateTime::<Utc>::MAX_UTC,
            initial_capital: 100_000.0,
            commission_rate: 0.001,
            spread_rate: 0.0005,
            slippage_model: SlippageModel::default(),
            max_slippage: 0.10,
            record_every_bar: false,
            performance: PerformanceConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Load from file with `BACKTEST__*` environment overrides
    pub fn from_file(path: &str) -> QuantResult<Self> {
        let config: Self = load_config(path, "BACKTEST")?;
        config.validate()?;
        Ok(config)
    }

    pub const fn costs(&self) -> TransactionCosts {
        TransactionCosts {
            commission_rate: self.commission_rate,
            spread_rate: self.spread_rate,
        }
    }

    /// Check ranges before a run starts
    pub fn validate(&self) -> QuantResult<()> {
        if self.start_date > self.end_date {
            return Err(QuantError::invalid(
                "start_date",
                format!("{} is after end date {}", self.start_date, self.end_date),
            ));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(QuantError::invalid("initial_capital", "must be positive"));
        }
        for (name, rate) in [("commission_rate", self.commission_rate), ("spread_rate", self.spread_rate)] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(QuantError::invalid(name, format!("must be non-negative, got {rate}")));
            }
        }
        if !(self.max_slippage.is_finite() && (0.0..1.0).contains(&self.max_slippage)) {
            return Err(QuantError::invalid("max_slippage", "must lie in [0, 1)"));
        }
        self.slippage_model.validate()?;
        self.performance.validate()
    }
}
