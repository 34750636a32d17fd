//! Unit tests for risk manager configuration

use common::QuantError;
use pretty_assertions::assert_eq;
use risk_manager::*;
use rstest::*;
use std::io::Write;

fn write_toml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults() {
    let config = RiskConfig::default();
    assert_eq!(config.confidence, 0.95);
    assert_eq!(config.method, VarMethod::Historical);
    assert_eq!(config.expected_shortfall_confidence, 0.975);
    assert_eq!(config.expected_shortfall_window, None);
    assert_eq!(config.stress_scenarios.len(), 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_from_file() {
    let file = write_toml(
        r#"
confidence = 0.99
method = "parametric"
expected_shortfall_window = 250

[[stress_scenarios]]
kind = "price_shock"
name = "flash_crash"
shock = -0.3
"#,
    );
    let config = RiskConfig::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.confidence, 0.99);
    assert_eq!(config.method, VarMethod::Parametric);
    assert_eq!(config.expected_shortfall_window, Some(250));
    assert_eq!(config.expected_shortfall_confidence, 0.975);
    assert_eq!(
        config.stress_scenarios,
        vec![StressScenario::PriceShock {
            name: "flash_crash".to_string(),
            shock: -0.3
        }]
    );
}

#[test]
fn test_file_with_invalid_confidence_is_rejected() {
    let file = write_toml("confidence = 1.5\n");
    assert!(matches!(
        RiskConfig::from_file(file.path().to_str().unwrap()),
        Err(QuantError::InvalidParameter { .. })
    ));
}

#[rstest]
#[case(RiskConfig { confidence: 0.0, ..RiskConfig::default() })]
#[case(RiskConfig { expected_shortfall_confidence: 1.0, ..RiskConfig::default() })]
#[case(RiskConfig { expected_shortfall_window: Some(0), ..RiskConfig::default() })]
fn test_invalid_configs(#[case] config: RiskConfig) {
    assert!(RiskMetricsCalculator::new(config).is_err());
}

#[test]
fn test_sizing_config_from_file() {
    let file = write_toml("max_drawdown = 0.2\nstop_loss_multiplier = 3.0\n");
    let config = SizingConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.max_drawdown, 0.2);
    assert_eq!(config.stop_loss_multiplier, 3.0);
    assert_eq!(config.default_position_size, 0.02);
}
