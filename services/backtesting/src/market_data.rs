//! Historical data capability and bar validation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Bar, QuantError, QuantResult};
use tracing::{debug, warn};

/// Source of historical bars.
///
/// Implementations return `DataUnavailable` when the range has no coverage.
#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    async fn fetch_bars(&self, instrument: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> QuantResult<Vec<Bar>>;
}

/// Bars ready for replay: malformed bars dropped, window applied, order checked.
///
/// # Errors
///
/// `OutOfOrderData` when a kept bar does not strictly follow its predecessor.
pub fn prepare_bars(instrument: &str, bars: Vec<Bar>, start: DateTime<Utc>, end: DateTime<Utc>) -> QuantResult<Vec<Bar>> {
    let received = bars.len();
    let mut prepared: Vec<Bar> = Vec::with_capacity(received);

    for bar in bars {
        if let Some(defect) = bar.defect() {
            warn!("Skipping bar for {} at {}: {}", instrument, bar.timestamp, defect);
            continue;
        }
        if bar.timestamp < start || bar.timestamp > end {
            continue;
        }
        if let Some(previous) = prepared.last() {
            if bar.timestamp <= previous.timestamp {
                return Err(QuantError::OutOfOrderData {
                    instrument: instrument.to_string(),
                    timestamp: bar.timestamp.to_rfc3339(),
                });
            }
        }
        prepared.push(bar);
    }

    debug!("Prepared {} of {} bars for {}", prepared.len(), received, instrument);
    Ok(prepared)
}
