//! Common types and primitives for the quant core
//!
//! Every component (backtest replay, performance analysis, risk metrics,
//! Monte Carlo simulation, portfolio optimization) depends only on this
//! crate and never on each other.

pub mod config;
pub mod errors;
pub mod stats;
pub mod telemetry;
pub mod types;

pub use config::load_config;
pub use errors::{QuantError, QuantResult, ensure_confidence};
pub use stats::{RatioPolicy, TRADING_DAYS_PER_YEAR};
pub use telemetry::{MetricsMap, MetricsSink, TelemetryTags, ToMetrics, TracingSink, publish};
pub use types::{Bar, EquityCurve, PortfolioWeights, PositionSnapshot, ReturnSeries, Side, Signal, Trade};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation shared between a caller and a long computation.
///
/// Checked between bars and between Monte Carlo paths.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    ///
    /// # Errors
    ///
    /// Returns [`QuantError::Cancelled`] after cancellation.
    pub fn check(&self) -> QuantResult<()> {
        if self.is_cancelled() {
            Err(QuantError::Cancelled)
        } else {
            Ok(())
        }
    }
}
