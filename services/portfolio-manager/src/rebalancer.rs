//! Portfolio rebalancing decisions
//!
//! Only the weight deltas are computed here; orders are sized and executed
//! by the external order system in the returned sequence.

use crate::config::RebalanceConfig;
use common::{PortfolioWeights, PositionSnapshot, QuantResult, Side};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// Risk above `target_volatility * RISK_TOLERANCE` triggers a rebalance
pub const RISK_TOLERANCE: f64 = 1.10;

/// One weight adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceTrade {
    pub asset: String,
    pub side: Side,
    pub from_weight: f64,
    pub to_weight: f64,
    /// Signed `to_weight - from_weight`
    pub weight_change: f64,
}

impl RebalanceTrade {
    /// Currency amount traded for a portfolio worth `portfolio_value`
    pub fn notional(&self, portfolio_value: f64) -> f64 {
        self.weight_change.abs() * portfolio_value
    }
}

/// True when current risk exceeds 110% of the target, or any asset's weight
/// deviates from its target by more than `threshold`. Either trigger suffices.
pub fn should_rebalance(
    target: &PortfolioWeights,
    current: &PortfolioWeights,
    current_risk: f64,
    target_volatility: f64,
    threshold: f64,
) -> bool {
    if current_risk > target_volatility * RISK_TOLERANCE {
        debug!("Risk {:.4} above target {:.4}", current_risk, target_volatility);
        return true;
    }

    let deviation = union(target, current)
        .map(|asset| (weight(target, asset) - weight(current, asset)).abs())
        .fold(0.0, f64::max);
    if deviation > threshold {
        debug!("Weight deviation {:.4} above threshold {:.4}", deviation, threshold);
        return true;
    }
    false
}

/// Trades moving `current` to `target`, one per asset whose weight changes
/// by more than `min_trade_weight`. Sells come first, then larger changes.
pub fn rebalance_trades(
    current: &PortfolioWeights,
    target: &PortfolioWeights,
    min_trade_weight: f64,
) -> Vec<RebalanceTrade> {
    let mut trades: Vec<RebalanceTrade> = union(target, current)
        .filter_map(|asset| {
            let from_weight = weight(current, asset);
            let to_weight = weight(target, asset);
            let weight_change = to_weight - from_weight;
            (weight_change.abs() > min_trade_weight).then(|| RebalanceTrade {
                asset: asset.to_string(),
                side: if weight_change > 0.0 { Side::Long } else { Side::Short },
                from_weight,
                to_weight,
                weight_change,
            })
        })
        .collect();

    trades.sort_by(|a, b| {
        sell_first(a.side, b.side)
            .then_with(|| b.weight_change.abs().total_cmp(&a.weight_change.abs()))
            .then_with(|| a.asset.cmp(&b.asset))
    });
    trades
}

/// Signed weights of a position snapshot over its gross exposure
pub fn weights_from_positions(position: &PositionSnapshot) -> PortfolioWeights {
    let gross = position.gross_exposure();
    if gross == 0.0 {
        return PortfolioWeights::new();
    }
    position
        .holdings
        .iter()
        .map(|(asset, notional)| (asset.clone(), notional / gross))
        .collect()
}

/// Portfolio rebalancer
#[derive(Debug, Clone, Default)]
pub struct Rebalancer {
    config: RebalanceConfig,
}

impl Rebalancer {
    pub fn new(config: RebalanceConfig) -> QuantResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    pub fn should_rebalance(&self, target: &PortfolioWeights, current: &PortfolioWeights, current_risk: f64) -> bool {
        should_rebalance(
            target,
            current,
            current_risk,
            self.config.target_volatility,
            self.config.rebalance_threshold,
        )
    }

    pub fn trades(&self, current: &PortfolioWeights, target: &PortfolioWeights) -> Vec<RebalanceTrade> {
        rebalance_trades(current, target, self.config.min_trade_weight)
    }
}

fn weight(weights: &PortfolioWeights, asset: &str) -> f64 {
    weights.get(asset).copied().unwrap_or(0.0)
}

fn union<'a>(a: &'a PortfolioWeights, b: &'a PortfolioWeights) -> impl Iterator<Item = &'a str> {
    a.keys()
        .chain(b.keys())
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
}

fn sell_first(a: Side, b: Side) -> Ordering {
    match (a, b) {
        (Side::Short, Side::Long) => Ordering::Less,
        (Side::Long, Side::Short) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
