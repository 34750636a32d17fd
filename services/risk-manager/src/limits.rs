//! Risk limits gating new signals

use crate::RiskCheckResult;
use crate::metrics::RiskMetricsResult;
use common::{QuantError, QuantResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Portfolio-level risk limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Largest acceptable VaR
    pub max_var: f64,
    /// Largest acceptable drawdown
    pub max_drawdown: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_var: 0.05,
            max_drawdown: 0.10,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> QuantResult<()> {
        if !(self.max_var.is_finite() && self.max_var > 0.0) {
            return Err(QuantError::invalid("max_var", "must be positive"));
        }
        if !(self.max_drawdown > 0.0 && self.max_drawdown <= 1.0) {
            return Err(QuantError::invalid("max_drawdown", "must lie in (0, 1]"));
        }
        Ok(())
    }

    /// Reject when VaR or drawdown is strictly above its limit
    pub fn check(&self, metrics: &RiskMetricsResult) -> RiskCheckResult {
        if metrics.var > self.max_var {
            warn!("VaR {:.4} exceeds limit {:.4}", metrics.var, self.max_var);
            return RiskCheckResult::Rejected(format!("VaR {:.4} exceeds limit {:.4}", metrics.var, self.max_var));
        }
        if metrics.drawdown > self.max_drawdown {
            warn!("Drawdown {:.4} exceeds limit {:.4}", metrics.drawdown, self.max_drawdown);
            return RiskCheckResult::Rejected(format!(
                "drawdown {:.4} exceeds limit {:.4}",
                metrics.drawdown, self.max_drawdown
            ));
        }
        RiskCheckResult::Approved
    }
}
