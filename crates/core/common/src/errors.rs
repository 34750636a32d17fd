//! Error types shared by every quant component

use thiserror::Error;

/// Errors raised by the quantitative core.
///
/// None of these are retried internally: every computation is a
/// deterministic function of its inputs, so the caller decides whether to
/// fetch more data or change parameters.
#[derive(Debug, Error)]
pub enum QuantError {
    /// Fewer observations than the algorithm requires
    #[error("Insufficient data for {context}: need at least {required}, got {actual}")]
    InsufficientData {
        context: &'static str,
        required: usize,
        actual: usize,
    },

    /// Parameter outside its valid domain
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Ratio with a zero denominator under the `Error` ratio policy
    #[error("Undefined ratio: {ratio} has a zero denominator")]
    UndefinedRatio { ratio: &'static str },

    /// No observation fell in the loss tail
    #[error("No tail observations at confidence {confidence} over {observations} observations")]
    InsufficientTailData {
        confidence: f64,
        observations: usize,
    },

    /// Covariance estimate is malformed or not positive semi-definite
    #[error("Invalid covariance matrix: {reason}")]
    InvalidCovariance { reason: String },

    /// Matrix inversion failed or produced non-finite values
    #[error("Singular matrix in {context}")]
    SingularMatrix { context: &'static str },

    /// Upstream data provider has no coverage for the request
    #[error("Data unavailable for {instrument}: {reason}")]
    DataUnavailable { instrument: String, reason: String },

    /// Bar stream is not strictly increasing in time
    #[error("Out-of-order bar for {instrument} at {timestamp}")]
    OutOfOrderData { instrument: String, timestamp: String },

    /// Strategy callback failed; the run is aborted
    #[error("Strategy failed on {instrument}")]
    Strategy {
        instrument: String,
        #[source]
        source: anyhow::Error,
    },

    /// Surrounding run was cancelled; partial results were discarded
    #[error("Computation cancelled")]
    Cancelled,
}

impl QuantError {
    /// Shorthand for [`QuantError::InvalidParameter`]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`QuantError::InsufficientData`]
    #[must_use]
    pub const fn insufficient(context: &'static str, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context,
            required,
            actual,
        }
    }
}

/// Result type for quant operations
pub type QuantResult<T> = Result<T, QuantError>;

/// Validate a confidence level lies strictly inside (0, 1).
///
/// # Errors
///
/// Returns [`QuantError::InvalidParameter`] otherwise.
pub fn ensure_confidence(name: &'static str, confidence: f64) -> QuantResult<()> {
    if confidence.is_finite() && confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(QuantError::invalid(
            name,
            format!("confidence must lie in (0, 1), got {confidence}"),
        ))
    }
}
