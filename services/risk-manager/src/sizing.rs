//! Kelly position sizing and drawdown trade gate

use crate::RiskCheckResult;
use common::{QuantError, QuantResult, load_config};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Trades are refused at or beyond this drawdown
    pub max_drawdown: f64,
    /// Fraction of the balance risked before Kelly and volatility scaling
    pub default_position_size: f64,
    pub stop_loss_multiplier: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_drawdown: 0.10,
            default_position_size: 0.02,
            stop_loss_multiplier: 2.0,
        }
    }
}

impl SizingConfig {
    /// Load from file with `RISK__*` environment overrides
    pub fn from_file(path: &str) -> QuantResult<Self> {
        let config: Self = load_config(path, "RISK")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QuantResult<()> {
        if !(self.max_drawdown > 0.0 && self.max_drawdown <= 1.0) {
            return Err(QuantError::invalid("max_drawdown", "must lie in (0, 1]"));
        }
        if !(self.default_position_size > 0.0 && self.default_position_size <= 1.0) {
            return Err(QuantError::invalid("default_position_size", "must lie in (0, 1]"));
        }
        if !(self.stop_loss_multiplier.is_finite() && self.stop_loss_multiplier > 0.0) {
            return Err(QuantError::invalid("stop_loss_multiplier", "must be positive"));
        }
        Ok(())
    }
}

/// Position sizer
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> QuantResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Kelly fraction `(p * b - (1 - p)) / b`; negative when there is no edge
    pub fn kelly_fraction(&self, win_rate: f64, win_loss_ratio: f64) -> QuantResult<f64> {
        if !(0.0..=1.0).contains(&win_rate) {
            return Err(QuantError::invalid("win_rate", format!("must lie in [0, 1], got {win_rate}")));
        }
        if !(win_loss_ratio.is_finite() && win_loss_ratio > 0.0) {
            return Err(QuantError::invalid("win_loss_ratio", "must be positive"));
        }
        Ok((win_rate * win_loss_ratio - (1.0 - win_rate)) / win_loss_ratio)
    }

    /// `balance * default_position_size * kelly / volatility`, zero without an edge
    pub fn position_size(&self, balance: f64, volatility: f64, kelly: f64) -> QuantResult<f64> {
        if !(volatility.is_finite() && volatility > 0.0) {
            return Err(QuantError::invalid("volatility", format!("must be positive, got {volatility}")));
        }
        Ok(balance * self.config.default_position_size * kelly.max(0.0) / volatility)
    }

    /// Distance from entry to stop: `price * volatility * stop_loss_multiplier`
    pub fn stop_loss_distance(&self, price: f64, volatility: f64) -> f64 {
        price * volatility * self.config.stop_loss_multiplier
    }

    pub fn validate_trade(&self, current_drawdown: f64) -> RiskCheckResult {
        if current_drawdown >= self.config.max_drawdown {
            warn!(
                "Maximum drawdown ({:.1}%) reached at {:.1}%. Trade rejected.",
                self.config.max_drawdown * 100.0,
                current_drawdown * 100.0
            );
            return RiskCheckResult::Rejected(format!(
                "drawdown {current_drawdown:.4} at or above limit {:.4}",
                self.config.max_drawdown
            ));
        }
        RiskCheckResult::Approved
    }
}
