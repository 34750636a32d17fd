//! Backtesting service
//!
//! Replays historical bars through a strategy with slippage and transaction
//! costs, producing a trade log and an equity curve, and derives performance
//! ratios from them.

pub mod config;
pub mod engine;
pub mod execution;
pub mod market_data;
pub mod performance;
pub mod portfolio;
pub mod strategy;

pub use config::BacktestConfig;
pub use engine::{BacktestEngine, BacktestResult};
pub use execution::{SlippageModel, TransactionCosts, fill_price};
pub use market_data::{HistoricalDataProvider, prepare_bars};
pub use performance::{PerformanceAnalyzer, PerformanceConfig, PerformanceMetrics};
pub use portfolio::{PortfolioTracker, Position};
pub use strategy::Strategy;
