//! Cash and position accounting for a replay

use common::Trade;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Signed holding with average cost
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Positive long, negative short
    pub quantity: f64,
    pub average_price: f64,
}

/// Portfolio tracker for cash, positions and marks
#[derive(Debug, Clone)]
pub struct PortfolioTracker {
    cash: f64,
    positions: BTreeMap<String, Position>,
    marks: BTreeMap<String, f64>,
}

impl PortfolioTracker {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// Record the latest close for `instrument`
    pub fn mark(&mut self, instrument: &str, price: f64) {
        self.marks.insert(instrument.to_string(), price);
    }

    /// Book `trade` and return the net P&L it realizes.
    ///
    /// Opening or adding to a position realizes nothing. Reducing, closing
    /// or flipping realizes the gross P&L on the closed quantity less the
    /// trade's full costs.
    pub fn apply(&mut self, trade: &Trade) -> Option<f64> {
        let signed = trade.side.sign() * trade.size;
        self.cash -= signed * trade.price + trade.total_cost();

        let position = self.positions.entry(trade.instrument.clone()).or_default();
        let held = position.quantity;

        if held == 0.0 || held.signum() == signed.signum() {
            let total = held.abs() + trade.size;
            position.average_price = (position.average_price * held.abs() + trade.price * trade.size) / total;
            position.quantity = held + signed;
            return None;
        }

        let closed = held.abs().min(trade.size);
        let gross = closed * (trade.price - position.average_price) * held.signum();
        let remaining = held + signed;

        if remaining == 0.0 || remaining.signum() == held.signum() {
            position.quantity = remaining;
        } else {
            debug!("{} position flipped to {:+}", trade.instrument, remaining);
            position.quantity = remaining;
            position.average_price = trade.price;
        }
        if position.quantity == 0.0 {
            self.positions.remove(&trade.instrument);
        }

        Some(gross - trade.total_cost())
    }

    /// Cash plus every position at its latest mark (average cost when unmarked)
    pub fn equity(&self) -> f64 {
        let holdings: f64 = self
            .positions
            .iter()
            .map(|(instrument, p)| p.quantity * self.marks.get(instrument).copied().unwrap_or(p.average_price))
            .sum();
        self.cash + holdings
    }
}
