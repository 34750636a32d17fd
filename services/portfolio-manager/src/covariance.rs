//! Covariance estimation from per-asset return series
//!
//! Entries are built as `corr(i, j) * σ_i * σ_j` from sample statistics,
//! symmetrised, and checked for positive semi-definiteness through a
//! symmetric eigen-decomposition. Eigenvalues within round-off of zero are
//! clipped; anything materially negative is rejected.

use common::stats;
use common::{PortfolioWeights, QuantError, QuantResult, TRADING_DAYS_PER_YEAR};
use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::debug;

/// Asset identifier to historical per-period returns, oldest first
pub type AssetReturns = BTreeMap<String, Vec<f64>>;

/// Relative size of a negative eigenvalue still attributed to round-off
const PSD_TOLERANCE: f64 = 1e-10;

/// Symmetric positive semi-definite covariance over a fixed asset order
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    assets: Vec<String>,
    matrix: DMatrix<f64>,
}

impl CovarianceMatrix {
    /// Validate a caller-supplied matrix whose rows follow `assets`.
    ///
    /// # Errors
    ///
    /// `InvalidCovariance` for a shape mismatch, non-finite entries,
    /// asymmetry beyond round-off or a materially negative eigenvalue.
    pub fn new(assets: Vec<String>, matrix: DMatrix<f64>) -> QuantResult<Self> {
        let n = assets.len();
        if matrix.nrows() != n || matrix.ncols() != n {
            return Err(QuantError::InvalidCovariance {
                reason: format!("{}x{} matrix for {} assets", matrix.nrows(), matrix.ncols(), n),
            });
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(QuantError::InvalidCovariance {
                reason: "non-finite entry".to_string(),
            });
        }

        let scale = matrix.amax().max(f64::MIN_POSITIVE);
        let asymmetry = (&matrix - matrix.transpose()).amax();
        if asymmetry > PSD_TOLERANCE * scale {
            return Err(QuantError::InvalidCovariance {
                reason: format!("asymmetric by {asymmetry:e}"),
            });
        }

        let symmetric = (&matrix + matrix.transpose()) * 0.5;
        Ok(Self {
            assets,
            matrix: ensure_psd(symmetric)?,
        })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn index_of(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// Values of `map` in asset order; a missing asset is an error
    pub fn align(&self, name: &'static str, map: &BTreeMap<String, f64>) -> QuantResult<DVector<f64>> {
        let values = self
            .assets
            .iter()
            .map(|asset| {
                map.get(asset)
                    .copied()
                    .ok_or_else(|| QuantError::invalid(name, format!("no value for asset {asset}")))
            })
            .collect::<QuantResult<Vec<f64>>>()?;
        Ok(DVector::from_vec(values))
    }

    /// Values of `weights` in asset order; an absent asset has zero weight
    pub fn align_weights(&self, weights: &PortfolioWeights) -> QuantResult<DVector<f64>> {
        if let Some(unknown) = weights.keys().find(|asset| self.index_of(asset).is_none()) {
            return Err(QuantError::invalid("weights", format!("asset {unknown} has no covariance")));
        }
        Ok(DVector::from_iterator(
            self.len(),
            self.assets.iter().map(|a| weights.get(a).copied().unwrap_or(0.0)),
        ))
    }
}

/// Estimate the covariance of `returns` through pairwise correlation.
///
/// # Errors
///
/// `InsufficientData` without assets or with fewer than two observations,
/// `InvalidCovariance` for mismatched lengths, non-finite returns or a
/// non-PSD result.
pub fn covariance_matrix(returns: &AssetReturns) -> QuantResult<CovarianceMatrix> {
    let Some(first) = returns.values().next() else {
        return Err(QuantError::insufficient("covariance assets", 1, 0));
    };
    let observations = first.len();
    if let Some((asset, series)) = returns.iter().find(|(_, r)| r.len() != observations) {
        return Err(QuantError::InvalidCovariance {
            reason: format!(
                "return series lengths differ: {asset} has {}, expected {observations}",
                series.len()
            ),
        });
    }
    if observations < 2 {
        return Err(QuantError::insufficient("covariance observations", 2, observations));
    }
    if returns.values().flatten().any(|r| !r.is_finite()) {
        return Err(QuantError::InvalidCovariance {
            reason: "non-finite return".to_string(),
        });
    }

    let series: Vec<&[f64]> = returns.values().map(Vec::as_slice).collect();
    let std_devs = series
        .iter()
        .map(|s| stats::sample_std_dev(s))
        .collect::<QuantResult<Vec<f64>>>()?;

    let n = series.len();
    let matrix = DMatrix::from_fn(n, n, |i, j| {
        correlation(series[i], series[j], std_devs[i], std_devs[j]) * std_devs[i] * std_devs[j]
    });

    debug!("Estimated {}x{} covariance over {} observations", n, n, observations);
    CovarianceMatrix::new(returns.keys().cloned().collect(), matrix)
}

/// Portfolio volatility `sqrt(w' Σ w)`, optionally annualized.
///
/// # Errors
///
/// `InvalidParameter` when `weights` names an asset outside the covariance.
pub fn portfolio_volatility(weights: &PortfolioWeights, covariance: &CovarianceMatrix, annualize: bool) -> QuantResult<f64> {
    let w = covariance.align_weights(weights)?;
    let variance = w.dot(&(covariance.matrix() * &w)).max(0.0);
    let volatility = variance.sqrt();
    Ok(if annualize { volatility * TRADING_DAYS_PER_YEAR.sqrt() } else { volatility })
}

/// Pearson correlation over the N-1 sample covariance; zero when either series is constant
fn correlation(a: &[f64], b: &[f64], std_a: f64, std_b: f64) -> f64 {
    if std_a == 0.0 || std_b == 0.0 {
        return 0.0;
    }
    (a.covariance(b) / (std_a * std_b)).clamp(-1.0, 1.0)
}

fn ensure_psd(matrix: DMatrix<f64>) -> QuantResult<DMatrix<f64>> {
    if matrix.is_empty() {
        return Ok(matrix);
    }
    let mut eigen = matrix.clone().symmetric_eigen();
    let scale = eigen.eigenvalues.amax().max(f64::MIN_POSITIVE);
    let smallest = eigen.eigenvalues.min();

    if smallest >= 0.0 {
        return Ok(matrix);
    }
    if smallest < -PSD_TOLERANCE * scale {
        return Err(QuantError::InvalidCovariance {
            reason: format!("not positive semi-definite, eigenvalue {smallest:e}"),
        });
    }

    debug!("Clipping eigenvalue {:e} to zero", smallest);
    eigen.eigenvalues.apply(|v| *v = v.max(0.0));
    let clipped = eigen.recompose();
    Ok((&clipped + clipped.transpose()) * 0.5)
}
