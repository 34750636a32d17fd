//! Risk manager configuration

use crate::stress::StressScenario;
use common::{QuantError, QuantResult, ensure_confidence, load_config};
use serde::{Deserialize, Serialize};

/// How VaR and CVaR are estimated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarMethod {
    /// Empirical quantile of the observed returns
    #[default]
    Historical,
    /// Normal fit of the observed returns
    Parametric,
}

/// Risk calculator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// VaR / CVaR confidence level
    pub confidence: f64,
    pub method: VarMethod,
    pub expected_shortfall_confidence: f64,
    /// Most recent returns used for expected shortfall; all when unset
    pub expected_shortfall_window: Option<usize>,
    pub stress_scenarios: Vec<StressScenario>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            method: VarMethod::Historical,
            expected_shortfall_confidence: 0.975,
            expected_shortfall_window: None,
            stress_scenarios: StressScenario::default_battery(),
        }
    }
}

impl RiskConfig {
    /// Load from file with `RISK__*` environment overrides
    pub fn from_file(path: &str) -> QuantResult<Self> {
        let config: Self = load_config(path, "RISK")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QuantResult<()> {
        ensure_confidence("confidence", self.confidence)?;
        ensure_confidence("expected_shortfall_confidence", self.expected_shortfall_confidence)?;
        if self.expected_shortfall_window == Some(0) {
            return Err(QuantError::invalid("expected_shortfall_window", "must be positive when set"));
        }
        self.stress_scenarios.iter().try_for_each(StressScenario::validate)
    }
}
