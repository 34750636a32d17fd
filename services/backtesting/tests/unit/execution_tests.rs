//! Unit tests for slippage and transaction costs

use crate::test_utils::*;
use approx::assert_relative_eq;
use backtesting::*;
use common::{QuantError, Side};
use rstest::*;

#[rstest]
#[case(SlippageModel::None, 0.0)]
#[case(SlippageModel::Fixed { bps: 25.0 }, 0.0025)]
// sqrt(1_000 / 1_000_000) * (1 / 100) * 2
#[case(SlippageModel::SquareRootImpact { volatility_factor: 2.0 }, (0.001f64).sqrt() * 0.02)]
fn test_slippage_models(#[case] model: SlippageModel, #[case] expected: f64) {
    let bar = &BarFactory::new().from_closes(&[100.0])[0];
    assert_relative_eq!(model.estimate(1_000.0, bar, 0.10), expected, epsilon = 1e-12);
}

#[rstest]
fn test_slippage_never_exceeds_cap() {
    let bar = &BarFactory::new().with_volume(1.0).with_half_range(40.0).from_closes(&[100.0])[0];
    let model = SlippageModel::SquareRootImpact { volatility_factor: 10.0 };
    assert_eq!(model.estimate(50.0, bar, 0.05), 0.05);
}

#[rstest]
fn test_zero_volume_bar_takes_cap() {
    let bar = &BarFactory::new().with_volume(0.0).from_closes(&[100.0])[0];
    assert_eq!(SlippageModel::default().estimate(1.0, bar, 0.1), 0.1);
}

#[rstest]
#[case(Side::Long, 102.0)]
#[case(Side::Short, 98.0)]
fn test_fill_price(#[case] side: Side, #[case] expected: f64) {
    assert_relative_eq!(fill_price(side, 100.0, 0.02), expected);
}

#[rstest]
fn test_spread_cost_uses_absolute_value() {
    let costs = TransactionCosts {
        commission_rate: 0.01,
        spread_rate: -0.001,
    };
    assert_relative_eq!(costs.spread_cost(200.0), 0.2);
    assert_relative_eq!(costs.commission(50.0), 0.5);
}

#[rstest]
fn test_model_serialization_format() {
    let model: SlippageModel = serde_json::from_str(r#"{"model":"fixed","bps":5.0}"#).unwrap();
    assert_eq!(model, SlippageModel::Fixed { bps: 5.0 });

    let json = serde_json::to_string(&SlippageModel::None).unwrap();
    assert_eq!(json, r#"{"model":"none"}"#);
}

#[rstest]
#[case(SlippageModel::Fixed { bps: -1.0 })]
#[case(SlippageModel::SquareRootImpact { volatility_factor: f64::NAN })]
fn test_invalid_models_rejected(#[case] model: SlippageModel) {
    assert!(matches!(model.validate(), Err(QuantError::InvalidParameter { .. })));
}
