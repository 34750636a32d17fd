//! Unit tests for BacktestEngine core functionality

use crate::test_utils::*;
use approx::assert_relative_eq;
use backtesting::*;
use common::{CancellationFlag, QuantError, Side};
use pretty_assertions::assert_eq;
use rstest::*;

const CAPITAL: f64 = 10_000.0;

fn provider() -> InMemoryProvider {
    InMemoryProvider::new().with_bars("AAPL", BarFactory::new().trending(5, 100.0, 1.0))
}

/// Long 10 on the first bar, flat again on the fourth
fn round_trip() -> ScriptedStrategy {
    ScriptedStrategy::at(&[(0, long(10.0, 100.0)), (3, short(10.0, 103.0))])
}

#[rstest]
fn test_engine_rejects_inverted_window() {
    let factory = BarFactory::new();
    let config = BacktestConfig {
        start_date: factory.timestamp(5),
        end_date: factory.timestamp(1),
        ..BacktestConfig::default()
    };
    assert!(matches!(
        BacktestEngine::new(config, provider()),
        Err(QuantError::InvalidParameter { name: "start_date", .. })
    ));
}

#[rstest]
#[case(BacktestConfig { initial_capital: 0.0, ..BacktestConfig::default() })]
#[case(BacktestConfig { commission_rate: -0.01, ..BacktestConfig::default() })]
#[case(BacktestConfig { max_slippage: 1.5, ..BacktestConfig::default() })]
fn test_invalid_config(#[case] config: BacktestConfig) {
    assert!(config.validate().is_err());
}

#[rstest]
#[tokio::test]
async fn test_equity_appended_after_each_trade() {
    let engine = BacktestEngine::new(TestConfigFactory::frictionless_config(CAPITAL), provider()).unwrap();

    let result = engine.run(&["AAPL"], &mut round_trip()).await.unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.equity.len(), 3);
    assert_relative_eq!(result.equity[0], CAPITAL);
    assert_relative_eq!(result.equity[1], CAPITAL);
    assert_relative_eq!(result.equity[2], CAPITAL + 30.0, epsilon = 1e-9);
    assert_eq!(result.trades[0].realized_pnl, None);
    assert_relative_eq!(result.trades[1].realized_pnl.unwrap(), 30.0, epsilon = 1e-9);
    assert!(result.metrics.is_none());
}

#[rstest]
#[tokio::test]
async fn test_equity_recorded_every_bar() {
    let config = BacktestConfig {
        record_every_bar: true,
        ..TestConfigFactory::frictionless_config(CAPITAL)
    };
    let engine = BacktestEngine::new(config, provider()).unwrap();

    let result = engine.run(&["AAPL"], &mut round_trip()).await.unwrap();

    let expected = [CAPITAL, CAPITAL, CAPITAL + 10.0, CAPITAL + 20.0, CAPITAL + 30.0, CAPITAL + 30.0];
    assert_eq!(result.equity.len(), expected.len());
    for (actual, expected) in result.equity.iter().zip(expected) {
        assert_relative_eq!(*actual, expected, epsilon = 1e-9);
    }
}

#[rstest]
#[tokio::test]
async fn test_slippage_and_costs_applied_to_trade() {
    let config = BacktestConfig {
        initial_capital: CAPITAL,
        commission_rate: 0.001,
        spread_rate: 0.0005,
        slippage_model: SlippageModel::Fixed { bps: 100.0 },
        ..BacktestConfig::default()
    };
    let engine = BacktestEngine::new(config, provider()).unwrap();
    let mut strategy = ScriptedStrategy::at(&[(0, long(10.0, 100.0))]);

    let result = engine.run(&["AAPL"], &mut strategy).await.unwrap();
    let trade = &result.trades[0];

    assert_eq!(trade.side, Side::Long);
    assert_relative_eq!(trade.slippage, 0.01);
    assert_relative_eq!(trade.price, 101.0, epsilon = 1e-9);
    assert_relative_eq!(trade.commission, 0.01, epsilon = 1e-12);
    assert_relative_eq!(trade.spread_cost, 0.05, epsilon = 1e-12);
    // bought 10 at 101 marked at 100, less costs
    assert_relative_eq!(result.equity[1], CAPITAL - 10.0 - 0.06, epsilon = 1e-9);
}

#[rstest]
#[tokio::test]
async fn test_unavailable_instrument_contributes_nothing() {
    let engine = BacktestEngine::new(TestConfigFactory::frictionless_config(CAPITAL), provider()).unwrap();
    let mut strategy = ScriptedStrategy::at(&[(0, long(1.0, 100.0))]);

    let result = engine.run(&["MISSING", "AAPL"], &mut strategy).await.unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].instrument, "AAPL");
}

#[rstest]
#[tokio::test]
async fn test_provider_failure_aborts_run() {
    let engine = BacktestEngine::new(
        TestConfigFactory::frictionless_config(CAPITAL),
        provider().with_broken("AAPL"),
    )
    .unwrap();

    let result = engine.run(&["AAPL"], &mut round_trip()).await;

    assert!(matches!(result, Err(QuantError::InvalidParameter { name: "provider", .. })));
}

#[rstest]
#[tokio::test]
async fn test_strategy_error_propagates() {
    let engine = BacktestEngine::new(TestConfigFactory::frictionless_config(CAPITAL), provider()).unwrap();

    let result = engine.run(&["AAPL"], &mut FailingStrategy::new(2)).await;

    match result {
        Err(QuantError::Strategy { instrument, source }) => {
            assert_eq!(instrument, "AAPL");
            assert_error_contains(&source, "model diverged");
        }
        other => panic!("expected strategy error, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_invalid_signal_is_strategy_error() {
    let engine = BacktestEngine::new(TestConfigFactory::frictionless_config(CAPITAL), provider()).unwrap();
    let mut strategy = ScriptedStrategy::at(&[(1, long(-3.0, 100.0))]);

    let result = engine.run(&["AAPL"], &mut strategy).await;

    assert!(matches!(result, Err(QuantError::Strategy { .. })));
}

#[rstest]
#[tokio::test]
async fn test_out_of_order_bars_abort_run() {
    let mut bars = BarFactory::new().trending(3, 100.0, 1.0);
    bars.swap(0, 2);
    let engine = BacktestEngine::new(
        TestConfigFactory::frictionless_config(CAPITAL),
        InMemoryProvider::new().with_bars("AAPL", bars),
    )
    .unwrap();

    let result = engine.run(&["AAPL"], &mut round_trip()).await;

    assert!(matches!(result, Err(QuantError::OutOfOrderData { .. })));
}

#[rstest]
#[tokio::test]
async fn test_cancelled_run_returns_nothing() {
    let engine = BacktestEngine::new(TestConfigFactory::frictionless_config(CAPITAL), provider()).unwrap();
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let result = engine.run_with_cancel(&["AAPL"], &mut round_trip(), &cancel).await;

    assert!(matches!(result, Err(QuantError::Cancelled)));
}

#[rstest]
#[tokio::test]
async fn test_window_limits_replayed_bars() {
    let factory = BarFactory::new();
    let config = BacktestConfig {
        start_date: factory.timestamp(1),
        end_date: factory.timestamp(2),
        ..TestConfigFactory::frictionless_config(CAPITAL)
    };
    let engine = BacktestEngine::new(config, provider()).unwrap();
    let mut strategy = ScriptedStrategy::new(Vec::new());

    engine.run(&["AAPL"], &mut strategy).await.unwrap();

    assert_eq!(strategy.calls(), 2);
}

#[rstest]
#[tokio::test]
async fn test_no_instruments_yields_initial_equity_only() {
    let engine = BacktestEngine::new(TestConfigFactory::frictionless_config(CAPITAL), provider()).unwrap();
    let instruments: [&str; 0] = [];

    let result = engine.run_and_analyze(&instruments, &mut round_trip()).await.unwrap();

    assert_eq!(result.equity, vec![CAPITAL]);
    assert!(result.trades.is_empty());
    assert!(result.metrics.is_none());
}
