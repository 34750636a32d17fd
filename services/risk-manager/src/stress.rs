//! Stress scenarios applied to a position snapshot
//!
//! Scenarios are independent of each other and evaluated on the rayon pool;
//! the report keeps every named loss in configuration order plus the maximum.

use common::{MetricsMap, PositionSnapshot, QuantError, QuantResult, ToMetrics};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Named stress scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StressScenario {
    /// Every holding moves by `shock` (e.g. -0.15)
    PriceShock { name: String, shock: f64 },
    /// Return volatility scaled by `multiplier`, loss taken at the configured quantile
    VolatilitySpike { name: String, multiplier: f64 },
    /// Unwinding the gross book costs `slippage`
    LiquidityCrisis { name: String, slippage: f64 },
}

impl StressScenario {
    /// Market crash, volatility spike and liquidity crisis
    pub fn default_battery() -> Vec<Self> {
        vec![
            Self::PriceShock {
                name: "market_crash".to_string(),
                shock: -0.15,
            },
            Self::VolatilitySpike {
                name: "volatility_spike".to_string(),
                multiplier: 2.5,
            },
            Self::LiquidityCrisis {
                name: "liquidity_crisis".to_string(),
                slippage: 0.05,
            },
        ]
    }

    pub fn name(&self) -> &str {
        match self {
            Self::PriceShock { name, .. } | Self::VolatilitySpike { name, .. } | Self::LiquidityCrisis { name, .. } => {
                name
            }
        }
    }

    pub fn validate(&self) -> QuantResult<()> {
        match *self {
            Self::PriceShock { shock, .. } if !(shock.is_finite() && shock > -1.0) => {
                Err(QuantError::invalid("shock", format!("must be finite and above -1, got {shock}")))
            }
            Self::VolatilitySpike { multiplier, .. } if !(multiplier.is_finite() && multiplier >= 0.0) => {
                Err(QuantError::invalid("multiplier", format!("must be non-negative, got {multiplier}")))
            }
            Self::LiquidityCrisis { slippage, .. } if !(0.0..=1.0).contains(&slippage) => {
                Err(QuantError::invalid("slippage", format!("must lie in [0, 1], got {slippage}")))
            }
            _ => Ok(()),
        }
    }

    /// Simulated loss (positive = money lost) for `position`.
    ///
    /// `volatility` is the per-period return volatility and `z` the standard
    /// normal quantile of the risk confidence level.
    pub fn loss(&self, position: &PositionSnapshot, volatility: f64, z: f64) -> f64 {
        match *self {
            Self::PriceShock { shock, .. } => -position.holdings.values().map(|notional| notional * shock).sum::<f64>(),
            Self::VolatilitySpike { multiplier, .. } => position.gross_exposure() * volatility * multiplier * z,
            Self::LiquidityCrisis { slippage, .. } => position.gross_exposure() * slippage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLoss {
    pub name: String,
    pub loss: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StressTestReport {
    pub losses: Vec<ScenarioLoss>,
    /// Largest loss across scenarios; 0 with no scenarios
    pub max_loss: f64,
}

impl StressTestReport {
    /// Evaluate every scenario independently and reduce to the maximum loss
    pub fn run(scenarios: &[StressScenario], position: &PositionSnapshot, volatility: f64, z: f64) -> Self {
        let losses: Vec<ScenarioLoss> = scenarios
            .par_iter()
            .map(|scenario| ScenarioLoss {
                name: scenario.name().to_string(),
                loss: scenario.loss(position, volatility, z),
            })
            .collect();

        let max_loss = losses
            .iter()
            .map(|l| l.loss)
            .reduce(f64::max)
            .unwrap_or(0.0);

        debug!("Stress test over {} scenarios, max loss {:.2}", losses.len(), max_loss);
        Self { losses, max_loss }
    }

    pub fn loss_for(&self, name: &str) -> Option<f64> {
        self.losses.iter().find(|l| l.name == name).map(|l| l.loss)
    }
}

impl ToMetrics for StressTestReport {
    fn to_metrics(&self) -> MetricsMap {
        let mut metrics: MetricsMap = self.losses.iter().map(|l| (l.name.clone(), l.loss)).collect();
        metrics.insert("max_loss".to_string(), self.max_loss);
        metrics
    }
}
