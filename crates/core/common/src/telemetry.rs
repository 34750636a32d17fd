//! Telemetry boundary
//!
//! Results are flattened into [`MetricsMap`]s and handed to a
//! [`MetricsSink`]. A sink failure is logged here and never reaches the
//! caller: persistence problems must not influence a trading decision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Flat metric name to value mapping
pub type MetricsMap = BTreeMap<String, f64>;

/// Tags attached to every published measurement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryTags {
    pub strategy: String,
    pub symbol: String,
    pub timeframe: String,
}

/// Types that can be flattened into a metrics map
pub trait ToMetrics {
    fn to_metrics(&self) -> MetricsMap;
}

/// External metrics destination
pub trait MetricsSink: Send + Sync {
    /// Persist one measurement.
    ///
    /// # Errors
    ///
    /// Implementations report their own transport/storage failures.
    fn write(&self, measurement: &str, tags: &TelemetryTags, fields: &MetricsMap) -> anyhow::Result<()>;
}

/// Hand `value` to `sink` once. Failures are logged and swallowed.
pub fn publish<S, T>(sink: &S, measurement: &str, tags: &TelemetryTags, value: &T)
where
    S: MetricsSink + ?Sized,
    T: ToMetrics + ?Sized,
{
    let fields = value.to_metrics();
    if let Err(e) = sink.write(measurement, tags, &fields) {
        error!("Failed to store {} metrics: {:#}", measurement, e);
    }
}

/// Sink that emits each measurement as a structured tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn write(&self, measurement: &str, tags: &TelemetryTags, fields: &MetricsMap) -> anyhow::Result<()> {
        info!(
            measurement,
            strategy = %tags.strategy,
            symbol = %tags.symbol,
            timeframe = %tags.timeframe,
            fields = %serde_json::to_string(fields)?,
            "metrics"
        );
        Ok(())
    }
}
