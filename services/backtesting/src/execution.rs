//! Fill simulation: slippage and transaction costs

use common::{Bar, QuantError, QuantResult, Side};
use serde::{Deserialize, Serialize};

const BPS_PER_UNIT: f64 = 10_000.0;

/// Slippage estimate applied to every signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SlippageModel {
    /// `sqrt(size / volume) * range_volatility * volatility_factor`
    SquareRootImpact { volatility_factor: f64 },
    /// Fixed basis points
    Fixed { bps: f64 },
    None,
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::SquareRootImpact { volatility_factor: 1.0 }
    }
}

impl SlippageModel {
    pub fn validate(&self) -> QuantResult<()> {
        match *self {
            Self::SquareRootImpact { volatility_factor } if !(volatility_factor.is_finite() && volatility_factor >= 0.0) => {
                Err(QuantError::invalid("volatility_factor", "must be non-negative"))
            }
            Self::Fixed { bps } if !(bps.is_finite() && bps >= 0.0) => {
                Err(QuantError::invalid("bps", "must be non-negative"))
            }
            _ => Ok(()),
        }
    }

    /// Slippage fraction for an order of `size` on `bar`, clamped to `[0, max_slippage]`.
    ///
    /// A bar without volume cannot absorb any size and gets `max_slippage`.
    pub fn estimate(&self, size: f64, bar: &Bar, max_slippage: f64) -> f64 {
        let raw = match *self {
            Self::SquareRootImpact { volatility_factor } => {
                if bar.volume <= 0.0 {
                    return max_slippage;
                }
                let market_impact = (size / bar.volume).sqrt();
                let volatility_impact = bar.range_volatility() * volatility_factor;
                market_impact * volatility_impact
            }
            Self::Fixed { bps } => bps / BPS_PER_UNIT,
            Self::None => 0.0,
        };
        raw.clamp(0.0, max_slippage)
    }
}

/// Price after slippage: longs pay up, shorts receive less
pub fn fill_price(side: Side, price: f64, slippage: f64) -> f64 {
    price * (1.0 + side.sign() * slippage)
}

/// Commission and spread parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionCosts {
    pub commission_rate: f64,
    pub spread_rate: f64,
}

impl TransactionCosts {
    pub fn commission(&self, size: f64) -> f64 {
        self.commission_rate * size
    }

    pub fn spread_cost(&self, price: f64) -> f64 {
        (price * self.spread_rate).abs()
    }

    /// `commission_rate * size + |price * spread_rate|`
    pub fn total(&self, size: f64, price: f64) -> f64 {
        self.commission(size) + self.spread_cost(price)
    }
}
