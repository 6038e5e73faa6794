//! Core sample types and the numeric value abstraction
//!
//! This module provides the fundamental types flowing through every pipeline
//! stage:
//! - [`Sample`]: a timestamped value, immutable once constructed
//! - [`SeriesValue`]: the numeric bound shared by all algorithms
//! - [`FieldValue`]: one field of a multi-field (array-valued) sample

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single timestamped observation.
///
/// Samples are value types: every transformation step produces a new
/// `Sample` instead of mutating one in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample<V> {
    /// Instant the observation refers to
    pub timestamp: DateTime<Utc>,
    /// Observed value
    pub value: V,
}

impl<V> Sample<V> {
    /// Create a new sample
    pub fn new(timestamp: DateTime<Utc>, value: V) -> Self {
        Self { timestamp, value }
    }

    /// Map the value to a different type while keeping the timestamp
    pub fn map<U, F>(self, f: F) -> Sample<U>
    where
        F: FnOnce(V) -> U,
    {
        Sample {
            timestamp: self.timestamp,
            value: f(self.value),
        }
    }
}

impl<V: fmt::Display> fmt::Display for Sample<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.value, self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Numeric bound for series values.
///
/// Algorithms are generic over any integer or floating-point type that can
/// round-trip through `f64`. The round-trip back to an integer type truncates
/// toward zero (Rust `as` cast semantics), not rounds; tests assert this.
pub trait SeriesValue: Copy + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static {
    /// Widen to `f64` for interpolation arithmetic
    fn to_f64(self) -> f64;

    /// Narrow back from `f64` to the native type, truncating toward zero
    /// for integer types
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_series_value {
    ($($t:ty),*) => {
        $(
            impl SeriesValue for $t {
                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $t
                }
            }
        )*
    };
}

impl_series_value!(f64, f32, i64, i32, u64, u32);

/// One field of a multi-field sample.
///
/// Multi-field samples carry a fixed-length ordered list of heterogeneously
/// typed numeric fields; each field interpolates through `f64` using its own
/// declared type for the round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    F64(f64),
    F32(f32),
    I64(i64),
    I32(i32),
    U64(u64),
    U32(u32),
}

impl FieldValue {
    /// Name of the field's numeric type, used in mismatch diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::F64(_) => "f64",
            FieldValue::F32(_) => "f32",
            FieldValue::I64(_) => "i64",
            FieldValue::I32(_) => "i32",
            FieldValue::U64(_) => "u64",
            FieldValue::U32(_) => "u32",
        }
    }

    /// Widen the field to `f64`
    pub fn to_f64(&self) -> f64 {
        match *self {
            FieldValue::F64(v) => v,
            FieldValue::F32(v) => v as f64,
            FieldValue::I64(v) => v as f64,
            FieldValue::I32(v) => v as f64,
            FieldValue::U64(v) => v as f64,
            FieldValue::U32(v) => v as f64,
        }
    }

    /// Narrow an `f64` back into the same variant as `self`, truncating
    /// toward zero for the integer variants
    pub fn with_f64(&self, value: f64) -> FieldValue {
        match self {
            FieldValue::F64(_) => FieldValue::F64(value),
            FieldValue::F32(_) => FieldValue::F32(value as f32),
            FieldValue::I64(_) => FieldValue::I64(value as i64),
            FieldValue::I32(_) => FieldValue::I32(value as i32),
            FieldValue::U64(_) => FieldValue::U64(value as u64),
            FieldValue::U32(_) => FieldValue::U32(value as u32),
        }
    }

    /// True when both fields carry the same numeric type
    pub fn same_type(&self, other: &FieldValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::F64(v) => write!(f, "{v}"),
            FieldValue::F32(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::U32(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_sample_map_keeps_timestamp() {
        let s = Sample::new(ts(60), 21i64);
        let doubled = s.map(|v| v * 2);
        assert_eq!(doubled.timestamp, ts(60));
        assert_eq!(doubled.value, 42);
    }

    #[test]
    fn test_series_value_round_trip() {
        assert_eq!(f64::from_f64(1.5), 1.5);
        assert_eq!(i64::from_f64(1.9), 1);
        assert_eq!(i64::from_f64(-1.9), -1);
        assert_eq!(u32::from_f64(2.999), 2);
        assert_eq!(42i32.to_f64(), 42.0);
        assert_eq!(42u64.to_f64(), 42.0);
    }

    #[test]
    fn test_field_value_with_f64_preserves_variant() {
        let field = FieldValue::I32(10);
        assert_eq!(field.with_f64(7.8), FieldValue::I32(7));
        let field = FieldValue::F64(10.0);
        assert_eq!(field.with_f64(7.8), FieldValue::F64(7.8));
    }

    #[test]
    fn test_field_value_same_type() {
        assert!(FieldValue::I64(1).same_type(&FieldValue::I64(9)));
        assert!(!FieldValue::I64(1).same_type(&FieldValue::U64(1)));
    }

    #[test]
    fn test_sample_serde_round_trip() {
        let s = Sample::new(ts(120), 3.5f64);
        let json = serde_json::to_string(&s).unwrap();
        let back: Sample<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
