//! Black-Litterman portfolio optimization
//!
//! Prior (equilibrium) returns are blended with investor views:
//!
//! ```text
//! μ = π + τΣPᵀ (PτΣPᵀ + Ω)⁻¹ (Q - Pπ)
//! ```
//!
//! and the posterior feeds an unconstrained mean-variance step
//! `w ∝ (δΣ)⁻¹ μ`, normalised to sum to one.

use crate::config::OptimizerConfig;
use crate::covariance::{AssetReturns, CovarianceMatrix, covariance_matrix, portfolio_volatility};
use crate::rebalancer::{RebalanceTrade, Rebalancer};
use common::{PortfolioWeights, QuantError, QuantResult};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Source of the prior expected returns `π`
#[derive(Debug, Clone, PartialEq)]
pub enum MarketPriors {
    /// Equilibrium returns per asset
    Explicit(BTreeMap<String, f64>),
    /// Reverse optimization `π = δΣw_mkt`
    Implied {
        market_weights: PortfolioWeights,
        risk_aversion: f64,
    },
}

/// Investor views: `k` rows over the covariance's `n` assets
#[derive(Debug, Clone, PartialEq)]
pub struct InvestorViews {
    /// Pick matrix `P` (k x n)
    pub matrix: DMatrix<f64>,
    /// View returns `Q` (k)
    pub returns: DVector<f64>,
    /// View uncertainty `Ω` (k x k); `diag(PτΣPᵀ)` when unset
    pub uncertainty: Option<DMatrix<f64>>,
}

impl InvestorViews {
    pub fn new(matrix: DMatrix<f64>, returns: DVector<f64>) -> Self {
        Self {
            matrix,
            returns,
            uncertainty: None,
        }
    }

    /// No views over `assets` assets; the posterior equals the prior
    pub fn none(assets: usize) -> Self {
        Self::new(DMatrix::zeros(0, assets), DVector::zeros(0))
    }

    #[must_use]
    pub fn with_uncertainty(mut self, omega: DMatrix<f64>) -> Self {
        self.uncertainty = Some(omega);
        self
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    fn validate(&self, assets: usize) -> QuantResult<()> {
        let k = self.matrix.nrows();
        if self.matrix.ncols() != assets {
            return Err(QuantError::invalid(
                "views",
                format!("pick matrix has {} columns for {} assets", self.matrix.ncols(), assets),
            ));
        }
        if self.returns.len() != k {
            return Err(QuantError::invalid(
                "views",
                format!("{} view returns for {} views", self.returns.len(), k),
            ));
        }
        if let Some(omega) = &self.uncertainty {
            if omega.nrows() != k || omega.ncols() != k {
                return Err(QuantError::invalid(
                    "views",
                    format!("uncertainty is {}x{}, expected {k}x{k}", omega.nrows(), omega.ncols()),
                ));
            }
        }
        Ok(())
    }
}

/// Result of a full optimize-and-check pass
#[derive(Debug, Clone, PartialEq)]
pub struct RebalancePlan {
    pub target_weights: PortfolioWeights,
    /// Annualized volatility of the current weights
    pub current_risk: f64,
    /// Empty when no trigger fired
    pub trades: Vec<RebalanceTrade>,
}

impl RebalancePlan {
    pub fn triggered(&self) -> bool {
        !self.trades.is_empty()
    }
}

/// Black-Litterman portfolio optimizer
#[derive(Debug, Clone, Default)]
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
}

impl PortfolioOptimizer {
    pub fn new(config: OptimizerConfig) -> QuantResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Prior expected returns `π` in covariance asset order
    pub fn prior_returns(&self, covariance: &CovarianceMatrix, priors: &MarketPriors) -> QuantResult<DVector<f64>> {
        match priors {
            MarketPriors::Explicit(returns) => covariance.align("priors", returns),
            MarketPriors::Implied {
                market_weights,
                risk_aversion,
            } => {
                if !(risk_aversion.is_finite() && *risk_aversion > 0.0) {
                    return Err(QuantError::invalid("risk_aversion", "must be positive"));
                }
                let w = covariance.align("market_weights", market_weights)?;
                Ok(covariance.matrix() * w * *risk_aversion)
            }
        }
    }

    /// Black-Litterman posterior expected returns.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for mis-shaped views, `SingularMatrix` when the
    /// view covariance cannot be inverted or the result is non-finite.
    pub fn posterior_returns(
        &self,
        covariance: &CovarianceMatrix,
        prior: &DVector<f64>,
        views: &InvestorViews,
    ) -> QuantResult<DVector<f64>> {
        if prior.len() != covariance.len() {
            return Err(QuantError::invalid(
                "priors",
                format!("{} prior returns for {} assets", prior.len(), covariance.len()),
            ));
        }
        views.validate(covariance.len())?;
        if views.is_empty() {
            return Ok(prior.clone());
        }

        let p = &views.matrix;
        let scaled = covariance.matrix() * self.config.tau;
        let scaled_pt = &scaled * p.transpose();
        let view_covariance = p * &scaled_pt;
        let omega = views
            .uncertainty
            .clone()
            .unwrap_or_else(|| DMatrix::from_diagonal(&view_covariance.diagonal()));

        let inverse = (view_covariance + omega)
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(QuantError::SingularMatrix {
                context: "view covariance",
            })?;

        let surprise = &views.returns - p * prior;
        let posterior = prior + scaled_pt * inverse * surprise;
        if posterior.iter().any(|v| !v.is_finite()) {
            return Err(QuantError::SingularMatrix {
                context: "posterior returns",
            });
        }
        Ok(posterior)
    }

    /// Mean-variance weights for `expected` returns, summing to one.
    ///
    /// # Errors
    ///
    /// `SingularMatrix` for a non-invertible covariance, `UndefinedRatio`
    /// when the raw weights sum to zero.
    pub fn weights_from_returns(
        &self,
        covariance: &CovarianceMatrix,
        expected: &DVector<f64>,
    ) -> QuantResult<PortfolioWeights> {
        let inverse = (covariance.matrix() * self.config.risk_aversion)
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(QuantError::SingularMatrix {
                context: "mean-variance covariance",
            })?;

        let raw = inverse * expected;
        let total = raw.sum();
        if !total.is_finite() || total.abs() < f64::EPSILON {
            return Err(QuantError::UndefinedRatio {
                ratio: "weight normalisation",
            });
        }

        Ok(covariance
            .assets()
            .iter()
            .zip(raw.iter())
            .map(|(asset, w)| (asset.clone(), w / total))
            .collect())
    }

    /// Target weights from historical returns, priors and views
    pub fn optimal_weights(
        &self,
        returns: &AssetReturns,
        priors: &MarketPriors,
        views: &InvestorViews,
    ) -> QuantResult<PortfolioWeights> {
        let covariance = covariance_matrix(returns)?;
        self.optimal_weights_with(&covariance, priors, views)
    }

    /// Target weights over a pre-computed covariance
    pub fn optimal_weights_with(
        &self,
        covariance: &CovarianceMatrix,
        priors: &MarketPriors,
        views: &InvestorViews,
    ) -> QuantResult<PortfolioWeights> {
        let prior = self.prior_returns(covariance, priors)?;
        let posterior = self.posterior_returns(covariance, &prior, views)?;
        let weights = self.weights_from_returns(covariance, &posterior)?;
        debug!("Optimal weights over {} assets with {} views", covariance.len(), views.len());
        Ok(weights)
    }

    /// Optimize, measure current risk and emit trades when a trigger fires
    pub fn plan(
        &self,
        returns: &AssetReturns,
        priors: &MarketPriors,
        views: &InvestorViews,
        current_weights: &PortfolioWeights,
    ) -> QuantResult<RebalancePlan> {
        let covariance = covariance_matrix(returns)?;
        let target_weights = self.optimal_weights_with(&covariance, priors, views)?;
        let current_risk = portfolio_volatility(current_weights, &covariance, true)?;

        let rebalancer = Rebalancer::new(self.config.rebalance)?;
        let trades = if rebalancer.should_rebalance(&target_weights, current_weights, current_risk) {
            let trades = rebalancer.trades(current_weights, &target_weights);
            info!(
                "Rebalance triggered: {} trades, current risk {:.4}",
                trades.len(),
                current_risk
            );
            trades
        } else {
            Vec::new()
        };

        Ok(RebalancePlan {
            target_weights,
            current_risk,
            trades,
        })
    }
}
