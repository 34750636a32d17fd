//! Optimizer configuration tests

use common::QuantError;
use pretty_assertions::assert_eq;
use portfolio_manager::*;
use rstest::*;
use std::io::Write;

#[test]
fn test_defaults() {
    let config = OptimizerConfig::default();
    assert_eq!(config.tau, 0.025);
    assert_eq!(config.rebalance.min_trade_weight, 1e-9);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        "tau = 0.05\nrisk_aversion = 3.0\n\n[rebalance]\ntarget_volatility = 0.12\nrebalance_threshold = 0.02\n"
    )
    .unwrap();

    let config = OptimizerConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(
        config,
        OptimizerConfig {
            tau: 0.05,
            risk_aversion: 3.0,
            rebalance: RebalanceConfig {
                target_volatility: 0.12,
                rebalance_threshold: 0.02,
                min_trade_weight: 1e-9,
            },
        }
    );
}

#[rstest]
#[case(OptimizerConfig { tau: 0.0, ..OptimizerConfig::default() }, "tau")]
#[case(OptimizerConfig { risk_aversion: -1.0, ..OptimizerConfig::default() }, "risk_aversion")]
#[case(
    OptimizerConfig {
        rebalance: RebalanceConfig { target_volatility: 0.0, ..RebalanceConfig::default() },
        ..OptimizerConfig::default()
    },
    "target_volatility"
)]
fn test_invalid_configs(#[case] config: OptimizerConfig, #[case] field: &str) {
    match PortfolioOptimizer::new(config) {
        Err(QuantError::InvalidParameter { name, .. }) => assert_eq!(name, field),
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
}
