//! Portfolio Manager Service
//!
//! Target allocation and rebalance planning:
//! - Covariance estimation from per-asset return series
//! - Black-Litterman posterior returns and mean-variance weights
//! - Rebalance triggers and ordered weight trades

pub mod config;
pub mod covariance;
pub mod optimization;
pub mod rebalancer;

pub use config::{OptimizerConfig, RebalanceConfig};
pub use covariance::{AssetReturns, CovarianceMatrix, covariance_matrix, portfolio_volatility};
pub use optimization::{InvestorViews, MarketPriors, PortfolioOptimizer, RebalancePlan};
pub use rebalancer::{
    RISK_TOLERANCE, RebalanceTrade, Rebalancer, rebalance_trades, should_rebalance, weights_from_positions,
};
