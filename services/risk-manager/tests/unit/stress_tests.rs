//! Unit tests for stress scenarios

use approx::assert_relative_eq;
use common::{PositionSnapshot, QuantError, ToMetrics};
use risk_manager::*;
use rstest::*;
use test_utils::*;

#[rstest]
fn test_default_battery_on_mixed_book(mixed_positions: PositionSnapshot) {
    let report = StressTestReport::run(&StressScenario::default_battery(), &mixed_positions, 0.02, 1.645);

    // net 60k long, gross 100k
    assert_relative_eq!(report.loss_for("market_crash").unwrap(), 9_000.0, epsilon = 1e-9);
    assert_relative_eq!(
        report.loss_for("volatility_spike").unwrap(),
        100_000.0 * 0.02 * 2.5 * 1.645,
        epsilon = 1e-9
    );
    assert_relative_eq!(report.loss_for("liquidity_crisis").unwrap(), 5_000.0, epsilon = 1e-9);
    assert_relative_eq!(report.max_loss, 9_000.0, epsilon = 1e-9);
}

#[rstest]
fn test_report_keeps_configuration_order(mixed_positions: PositionSnapshot) {
    let report = StressTestReport::run(&StressScenario::default_battery(), &mixed_positions, 0.01, 1.0);
    let names: Vec<&str> = report.losses.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["market_crash", "volatility_spike", "liquidity_crisis"]);
}

#[test]
fn test_short_book_gains_in_crash() {
    let short = PositionSnapshot::new([("SPY".to_string(), -10_000.0)].into());
    let crash = StressScenario::PriceShock {
        name: "crash".to_string(),
        shock: -0.2,
    };
    assert_relative_eq!(crash.loss(&short, 0.0, 0.0), -2_000.0, epsilon = 1e-9);
}

#[rstest]
fn test_empty_battery(mixed_positions: PositionSnapshot) {
    let report = StressTestReport::run(&[], &mixed_positions, 0.02, 1.645);
    assert!(report.losses.is_empty());
    assert_eq!(report.max_loss, 0.0);
    assert_eq!(report.to_metrics().get("max_loss"), Some(&0.0));
}

#[rstest]
#[case(StressScenario::PriceShock { name: "x".into(), shock: -1.5 }, "shock")]
#[case(StressScenario::VolatilitySpike { name: "x".into(), multiplier: -1.0 }, "multiplier")]
#[case(StressScenario::LiquidityCrisis { name: "x".into(), slippage: 1.2 }, "slippage")]
fn test_invalid_scenarios(#[case] scenario: StressScenario, #[case] field: &str) {
    match scenario.validate() {
        Err(QuantError::InvalidParameter { name, .. }) => assert_eq!(name, field),
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
}

#[test]
fn test_scenario_metrics_keys() {
    let book = PositionSnapshot::new([("AAPL".to_string(), 1_000.0)].into());
    let metrics = StressTestReport::run(&StressScenario::default_battery(), &book, 0.01, 1.0).to_metrics();
    for key in ["market_crash", "volatility_spike", "liquidity_crisis", "max_loss"] {
        assert!(metrics.contains_key(key), "missing {key}");
    }
}
