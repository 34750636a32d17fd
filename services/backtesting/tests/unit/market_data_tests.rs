//! Unit tests for bar preparation

use crate::test_utils::*;
use backtesting::*;
use chrono::{DateTime, Duration, Utc};
use common::QuantError;
use rstest::*;

fn window() -> (DateTime<Utc>, DateTime<Utc>) {
    (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
}

#[rstest]
fn test_malformed_bars_are_skipped() {
    init_test_logging();
    let mut bars = BarFactory::new().trending(4, 100.0, 1.0);
    bars[1].high = bars[1].low - 1.0;
    bars[2].close = f64::NAN;

    let (start, end) = window();
    let prepared = prepare_bars("AAPL", bars, start, end).unwrap();

    assert_eq!(prepared.len(), 2);
    assert_eq!(prepared[0].close, 100.0);
    assert_eq!(prepared[1].close, 103.0);
}

#[rstest]
fn test_bars_outside_window_ignored() {
    let factory = BarFactory::new();
    let bars = factory.trending(10, 100.0, 1.0);

    let prepared = prepare_bars("AAPL", bars, factory.timestamp(2), factory.timestamp(5)).unwrap();

    assert_eq!(prepared.len(), 4);
    assert_eq!(prepared.first().unwrap().timestamp, factory.timestamp(2));
    assert_eq!(prepared.last().unwrap().timestamp, factory.timestamp(5));
}

#[rstest]
#[case(Duration::days(-2))]
#[case(Duration::zero())]
fn test_non_increasing_timestamp_is_rejected(#[case] shift: Duration) {
    let mut bars = BarFactory::new().trending(3, 100.0, 1.0);
    bars[2].timestamp = bars[1].timestamp + shift;

    let (start, end) = window();
    let result = prepare_bars("MSFT", bars, start, end);

    assert!(matches!(result, Err(QuantError::OutOfOrderData { ref instrument, .. }) if instrument == "MSFT"));
}

#[rstest]
fn test_empty_input_is_not_an_error() {
    let (start, end) = window();
    assert!(prepare_bars("EMPTY", Vec::new(), start, end).unwrap().is_empty());
}
