//! Error types for the time-series engine
//!
//! Every pipeline stage either produces a value or terminates the downstream
//! pipeline with the first error encountered; nothing is retried or swallowed.
//! Cancellation is surfaced through its own variant so callers can tell
//! "caller gave up" apart from a data or logic problem. End-of-sequence is not
//! an error: stages signal it with `Ok(None)`.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for all pipeline operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimegridError {
    /// Bracketing samples share a timestamp and the target is not that instant
    #[error("degenerate interpolation interval at {at}: bracketing samples share a timestamp")]
    DegenerateInterval { at: DateTime<Utc> },

    /// Interpolation target lies outside the bracketing interval
    #[error("interpolation target {target} outside [{lower}, {upper}]")]
    OutOfBounds {
        target: DateTime<Utc>,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    },

    /// A cluster bucket yielded no samples. Buckets are derived from existing
    /// samples, so this indicates a contract violation in the clustering stage.
    #[error("empty cluster for bucket {bucket}")]
    EmptyCluster { bucket: DateTime<Utc> },

    /// Delta input must have strictly increasing timestamps
    #[error("non-monotonic timestamp: {next} does not advance past {prev}")]
    NonMonotonicTimestamp {
        prev: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    /// Gap filler was asked to fill with a mode it does not know
    #[error("unsupported fill mode: {mode}")]
    UnsupportedFillMode { mode: String },

    /// Multi-field samples must carry the same number of fields
    #[error("field count mismatch: left sample has {left} fields, right has {right}")]
    FieldCountMismatch { left: usize, right: usize },

    /// Multi-field samples must agree on each field's numeric type
    #[error("field type mismatch at index {index}: {left} vs {right}")]
    FieldTypeMismatch {
        index: usize,
        left: &'static str,
        right: &'static str,
    },

    /// The join engine needs at least one input stream
    #[error("join requires at least one input stream")]
    JoinWithoutInputs,

    /// The pipeline observed a cancellation or deadline signal
    #[error("pipeline cancelled")]
    Cancelled,
}

impl TimegridError {
    /// True when the pipeline terminated because the caller gave up,
    /// rather than because of a data or logic problem.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TimegridError::Cancelled)
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, TimegridError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_error_display_carries_timestamps() {
        let err = TimegridError::NonMonotonicTimestamp {
            prev: ts(120),
            next: ts(60),
        };
        let msg = err.to_string();
        assert!(msg.contains("non-monotonic"));
        assert!(msg.contains("1970-01-01 00:02:00"));
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = TimegridError::OutOfBounds {
            target: ts(10),
            lower: ts(20),
            upper: ts(30),
        };
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(TimegridError::Cancelled.is_cancelled());
        assert!(!TimegridError::JoinWithoutInputs.is_cancelled());
    }
}
