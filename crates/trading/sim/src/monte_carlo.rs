//! Monte Carlo simulation of synthetic return paths
//!
//! Returns are drawn from a normal fit of the historical series using the
//! Box-Muller transform and compounded as log returns from a fixed starting
//! notional. Paths are independent and run on the rayon pool; aggregation
//! only starts once every path has completed.

use common::stats::{self, quantile_index};
use common::{
    CancellationFlag, MetricsMap, QuantError, QuantResult, ReturnSeries, ToMetrics, ensure_confidence,
    load_config,
};
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Number of independent paths
    pub iterations: usize,
    /// Periods per path
    pub horizon: usize,
    pub confidence: f64,
    /// Starting notional of every path
    pub initial_value: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            horizon: 252, // trading days
            confidence: 0.95,
            initial_value: 100.0,
        }
    }
}

impl MonteCarloConfig {
    /// Load from a config file with `MONTE_CARLO__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or the values are invalid.
    pub fn from_file(path: &str) -> QuantResult<Self> {
        let config: Self = load_config(path, "MONTE_CARLO")?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Rejects zero iterations/horizon, a confidence outside (0, 1) and a
    /// non-positive starting value.
    pub fn validate(&self) -> QuantResult<()> {
        if self.iterations == 0 {
            return Err(QuantError::invalid("iterations", "must be positive"));
        }
        if self.horizon == 0 {
            return Err(QuantError::invalid("horizon", "must be positive"));
        }
        ensure_confidence("confidence", self.confidence)?;
        if !(self.initial_value.is_finite() && self.initial_value > 0.0) {
            return Err(QuantError::invalid(
                "initial_value",
                format!("must be positive, got {}", self.initial_value),
            ));
        }
        Ok(())
    }
}

/// Maximum-likelihood normal fit of a return series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalFit {
    pub mean: f64,
    /// Sample standard deviation (N - 1)
    pub std_dev: f64,
}

impl NormalFit {
    /// # Errors
    ///
    /// Requires at least two returns.
    pub fn estimate(returns: &ReturnSeries) -> QuantResult<Self> {
        let values = returns.as_slice();
        Ok(Self {
            mean: stats::mean(values)?,
            std_dev: stats::sample_std_dev(values)?,
        })
    }

    /// `mean + std_dev * z` for a fresh standard normal `z`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.mean + self.std_dev * box_muller(rng)
    }
}

/// Standard normal draw via Box-Muller. `u1` lies in (0, 1] so `ln(u1)` is finite.
pub fn box_muller<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.sample::<f64, _>(Standard);
    let u2 = rng.sample::<f64, _>(Standard);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Outcome of one simulated path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub final_value: f64,
    /// Peak-to-trough decline including the starting notional
    pub max_drawdown: f64,
    /// Sample volatility of the path's simple returns; 0 for a single-period path
    pub volatility: f64,
    /// Simple per-period returns of the path
    pub returns: Vec<f64>,
}

/// Distribution of final values across all paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Final value at `floor((1 - c) * n)` of the ascending order
    pub var: f64,
    /// Mean final value strictly below the VaR index
    pub cvar: f64,
    pub worst_case: f64,
    pub best_case: f64,
    /// Upper middle element for an even number of paths
    pub median: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub expected_final_value: f64,
    /// Share of paths finishing below the starting notional
    pub probability_of_loss: f64,
    pub mean_max_drawdown: f64,
    pub confidence: f64,
    pub iterations: usize,
}

impl ToMetrics for SimulationSummary {
    #[allow(clippy::cast_precision_loss)]
    fn to_metrics(&self) -> MetricsMap {
        MetricsMap::from([
            ("var".to_string(), self.var),
            ("cvar".to_string(), self.cvar),
            ("worst_case".to_string(), self.worst_case),
            ("best_case".to_string(), self.best_case),
            ("median".to_string(), self.median),
            ("lower_bound".to_string(), self.lower_bound),
            ("upper_bound".to_string(), self.upper_bound),
            ("expected_final_value".to_string(), self.expected_final_value),
            ("probability_of_loss".to_string(), self.probability_of_loss),
            ("mean_max_drawdown".to_string(), self.mean_max_drawdown),
            ("iterations".to_string(), self.iterations as f64),
        ])
    }
}

/// Monte Carlo simulator over a normal fit of historical returns
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn new(config: MonteCarloConfig) -> QuantResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Simulate and aggregate.
    ///
    /// `rng` only seeds the paths: the same generator state yields the same
    /// summary regardless of how rayon schedules the work.
    ///
    /// # Errors
    ///
    /// `InsufficientData` for fewer than two returns and
    /// `InsufficientTailData` when no path falls below the VaR index.
    pub fn simulate<R: Rng + ?Sized>(&self, returns: &ReturnSeries, rng: &mut R) -> QuantResult<SimulationSummary> {
        let paths = self.simulate_paths(returns, rng, None)?;
        self.aggregate(&paths)
    }

    /// [`simulate`](Self::simulate) that stops between paths once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` and discards every completed path when cancelled.
    pub fn simulate_with_cancel<R: Rng + ?Sized>(
        &self,
        returns: &ReturnSeries,
        rng: &mut R,
        cancel: &CancellationFlag,
    ) -> QuantResult<SimulationSummary> {
        let paths = self.simulate_paths(returns, rng, Some(cancel))?;
        self.aggregate(&paths)
    }

    /// Generate every path without aggregating.
    ///
    /// # Errors
    ///
    /// `InsufficientData` for fewer than two returns, `Cancelled` on cancellation.
    pub fn simulate_paths<R: Rng + ?Sized>(
        &self,
        returns: &ReturnSeries,
        rng: &mut R,
        cancel: Option<&CancellationFlag>,
    ) -> QuantResult<Vec<PathResult>> {
        let fit = NormalFit::estimate(returns)?;
        debug!(
            "Normal fit over {} returns: mean {:.6}, std {:.6}",
            returns.len(),
            fit.mean,
            fit.std_dev
        );

        let seeds: Vec<u64> = (0..self.config.iterations).map(|_| rng.sample::<u64, _>(Standard)).collect();

        let paths = seeds
            .into_par_iter()
            .map(|seed| {
                if let Some(flag) = cancel {
                    flag.check()?;
                }
                let mut path_rng = StdRng::seed_from_u64(seed);
                Ok(self.generate_path(&fit, &mut path_rng))
            })
            .collect::<QuantResult<Vec<_>>>()?;

        info!("Simulated {} paths over {} periods", paths.len(), self.config.horizon);
        Ok(paths)
    }

    fn generate_path<R: Rng + ?Sized>(&self, fit: &NormalFit, rng: &mut R) -> PathResult {
        let mut path = Vec::with_capacity(self.config.horizon + 1);
        let mut value = self.config.initial_value;
        path.push(value);

        for _ in 0..self.config.horizon {
            value *= fit.sample(rng).exp();
            path.push(value);
        }

        let returns: Vec<f64> = path.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        let volatility = stats::sample_std_dev(&returns).unwrap_or(0.0);

        PathResult {
            final_value: value,
            max_drawdown: stats::max_drawdown(&path),
            volatility,
            returns,
        }
    }

    /// Reduce completed paths into a summary.
    ///
    /// # Errors
    ///
    /// `InsufficientData` for no paths, `InsufficientTailData` when the VaR
    /// index is zero and the tail below it is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn aggregate(&self, paths: &[PathResult]) -> QuantResult<SimulationSummary> {
        if paths.is_empty() {
            return Err(QuantError::insufficient("simulation aggregate", 1, 0));
        }

        let finals: Vec<f64> = paths.iter().map(|p| p.final_value).collect();
        let sorted = stats::sorted_ascending(&finals);
        let n = sorted.len();
        let confidence = self.config.confidence;

        let var_index = quantile_index(1.0 - confidence, n);
        let tail = &sorted[..var_index];
        if tail.is_empty() {
            return Err(QuantError::InsufficientTailData {
                confidence,
                observations: n,
            });
        }

        let initial = self.config.initial_value;
        let losing = finals.iter().filter(|&&v| v < initial).count();
        let drawdowns: Vec<f64> = paths.iter().map(|p| p.max_drawdown).collect();

        Ok(SimulationSummary {
            var: sorted[var_index],
            cvar: stats::mean(tail)?,
            worst_case: sorted[0],
            best_case: sorted[n - 1],
            median: sorted[n / 2],
            lower_bound: sorted[var_index],
            upper_bound: sorted[quantile_index(confidence, n)],
            expected_final_value: stats::mean(&finals)?,
            probability_of_loss: losing as f64 / n as f64,
            mean_max_drawdown: stats::mean(&drawdowns)?,
            confidence,
            iterations: n,
        })
    }
}
