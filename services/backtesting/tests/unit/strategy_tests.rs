//! Unit tests for the strategy capability

use crate::test_utils::*;
use backtesting::*;
use common::Side;
use rstest::*;

#[rstest]
fn test_scripted_strategy_follows_script() {
    let bars = BarFactory::new().trending(4, 10.0, 1.0);
    let mut strategy = ScriptedStrategy::at(&[(1, long(2.0, 11.0)), (2, short(2.0, 12.0))]);

    let signals: Vec<_> = bars.iter().map(|b| strategy.analyze(b).unwrap()).collect();

    assert!(signals[0].is_none());
    assert_eq!(signals[1].as_ref().unwrap().side, Side::Long);
    assert_eq!(signals[2].as_ref().unwrap().side, Side::Short);
    assert!(signals[3].is_none());
}

#[rstest]
fn test_boxed_strategy_dispatches() {
    let bars = BarFactory::new().trending(2, 10.0, 1.0);
    let mut strategy: Box<dyn Strategy> = Box::new(FailingStrategy::new(1));

    assert!(strategy.analyze(&bars[0]).is_ok());
    let err = strategy.analyze(&bars[1]).unwrap_err();
    assert_error_contains(&err, "model diverged");
}
