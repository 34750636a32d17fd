//! Simulation of synthetic return paths
//!
//! The simulator draws every path from an injected generator so runs are
//! reproducible; see [`monte_carlo::MonteCarloSimulator`].

pub mod monte_carlo;

pub use monte_carlo::{
    MonteCarloConfig, MonteCarloSimulator, NormalFit, PathResult, SimulationSummary, box_muller,
};
