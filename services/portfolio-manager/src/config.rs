//! Optimizer and rebalance configuration

use common::{QuantError, QuantResult, load_config};
use serde::{Deserialize, Serialize};

/// Black-Litterman optimizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Uncertainty scaling of the prior covariance
    pub tau: f64,
    /// Risk aversion `δ` of the mean-variance step
    pub risk_aversion: f64,
    pub rebalance: RebalanceConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tau: 0.025,
            risk_aversion: 2.5,
            rebalance: RebalanceConfig::default(),
        }
    }
}

impl OptimizerConfig {
    /// Load from file with `OPTIMIZER__*` environment overrides
    pub fn from_file(path: &str) -> QuantResult<Self> {
        let config: Self = load_config(path, "OPTIMIZER")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QuantResult<()> {
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(QuantError::invalid("tau", format!("must be positive, got {}", self.tau)));
        }
        if !(self.risk_aversion.is_finite() && self.risk_aversion > 0.0) {
            return Err(QuantError::invalid(
                "risk_aversion",
                format!("must be positive, got {}", self.risk_aversion),
            ));
        }
        self.rebalance.validate()
    }
}

/// Rebalance trigger configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Annualized volatility target; risk above 110% of it triggers a rebalance
    pub target_volatility: f64,
    /// Largest tolerated per-asset weight deviation
    pub rebalance_threshold: f64,
    /// Weight moves at or below this produce no trade
    pub min_trade_weight: f64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            target_volatility: 0.15,
            rebalance_threshold: 0.05,
            min_trade_weight: 1e-9,
        }
    }
}

impl RebalanceConfig {
    pub fn validate(&self) -> QuantResult<()> {
        if !(self.target_volatility.is_finite() && self.target_volatility > 0.0) {
            return Err(QuantError::invalid("target_volatility", "must be positive"));
        }
        if !(self.rebalance_threshold.is_finite() && self.rebalance_threshold >= 0.0) {
            return Err(QuantError::invalid("rebalance_threshold", "must be non-negative"));
        }
        if !(self.min_trade_weight.is_finite() && self.min_trade_weight >= 0.0) {
            return Err(QuantError::invalid("min_trade_weight", "must be non-negative"));
        }
        Ok(())
    }
}
