//! Risk Manager Service
//!
//! Risk analytics over return series and position snapshots:
//! - Historical and parametric VaR / CVaR
//! - Expected shortfall and drawdown
//! - Stress scenarios evaluated in parallel
//! - Kelly position sizing and limit checks

pub mod config;
pub mod limits;
pub mod metrics;
pub mod sizing;
pub mod stress;

pub use config::{RiskConfig, VarMethod};
pub use limits::RiskLimits;
pub use metrics::{
    RiskMetricsCalculator, RiskMetricsResult, expected_shortfall, historical_cvar, historical_var, parametric_cvar,
    parametric_var,
};
pub use sizing::{PositionSizer, SizingConfig};
pub use stress::{ScenarioLoss, StressScenario, StressTestReport};

use serde::{Deserialize, Serialize};

/// Risk check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCheckResult {
    /// Trade approved
    Approved,
    /// Trade rejected with reason
    Rejected(String),
}

impl RiskCheckResult {
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}
