//! Time-weighted linear interpolation
//!
//! Computes the value at a target instant between two bracketing samples.
//! The weight is the real-seconds fraction of the interval elapsed at the
//! target; arithmetic happens in `f64` and the result is cast back to the
//! value's native numeric type, truncating toward zero for integer types.

use chrono::{DateTime, Utc};

use crate::error::{Result, TimegridError};
use crate::sample::{FieldValue, SeriesValue};

/// Interpolate a single numeric value at `target` between `(t1, v1)` and
/// `(t2, v2)`.
///
/// Fails with [`TimegridError::DegenerateInterval`] when `t1 == t2` unless
/// the target is exactly that instant (then `v1` is returned), and with
/// [`TimegridError::OutOfBounds`] when the target lies outside `[t1, t2]`.
pub fn interpolate<V: SeriesValue>(
    target: DateTime<Utc>,
    t1: DateTime<Utc>,
    v1: V,
    t2: DateTime<Utc>,
    v2: V,
) -> Result<V> {
    let weight = interval_weight(target, t1, t2)?;
    match weight {
        Some(w) => {
            let a = v1.to_f64();
            let b = v2.to_f64();
            Ok(V::from_f64(a + (b - a) * w))
        }
        None => Ok(v1),
    }
}

/// Interpolate a multi-field sample element-wise.
///
/// Both sides must carry the same number of fields and agree on each field's
/// numeric type; each field round-trips through `f64` using its own variant.
pub fn interpolate_fields(
    target: DateTime<Utc>,
    t1: DateTime<Utc>,
    v1: &[FieldValue],
    t2: DateTime<Utc>,
    v2: &[FieldValue],
) -> Result<Vec<FieldValue>> {
    if v1.len() != v2.len() {
        return Err(TimegridError::FieldCountMismatch {
            left: v1.len(),
            right: v2.len(),
        });
    }

    let weight = interval_weight(target, t1, t2)?;
    let Some(w) = weight else {
        return Ok(v1.to_vec());
    };

    let mut out = Vec::with_capacity(v1.len());
    for (index, (a, b)) in v1.iter().zip(v2.iter()).enumerate() {
        if !a.same_type(b) {
            return Err(TimegridError::FieldTypeMismatch {
                index,
                left: a.type_name(),
                right: b.type_name(),
            });
        }
        let fa = a.to_f64();
        let fb = b.to_f64();
        out.push(a.with_f64(fa + (fb - fa) * w));
    }
    Ok(out)
}

/// Validate the bracketing interval and compute the interpolation weight.
///
/// `Ok(None)` means the interval is degenerate but the target coincides with
/// it, so the left value should be passed through unchanged.
fn interval_weight(
    target: DateTime<Utc>,
    t1: DateTime<Utc>,
    t2: DateTime<Utc>,
) -> Result<Option<f64>> {
    if t1 == t2 {
        if target == t1 {
            return Ok(None);
        }
        return Err(TimegridError::DegenerateInterval { at: t1 });
    }
    if target < t1 || target > t2 {
        return Err(TimegridError::OutOfBounds {
            target,
            lower: t1,
            upper: t2,
        });
    }
    let span = duration_micros(t2 - t1);
    if span == 0.0 {
        // distinct instants less than a microsecond apart; no meaningful
        // weight exists below the supported granularity
        return Err(TimegridError::DegenerateInterval { at: t1 });
    }
    let offset = duration_micros(target - t1);
    Ok(Some(offset / span))
}

fn duration_micros(d: chrono::Duration) -> f64 {
    match d.num_microseconds() {
        Some(us) => us as f64,
        // spans beyond i64 microseconds; millisecond precision suffices
        None => d.num_milliseconds() as f64 * 1_000.0,
    }
}

/// Values that can be linearly interpolated between two bracketing samples.
///
/// Blanket-implemented for every [`SeriesValue`]; multi-field samples get an
/// element-wise implementation over `Vec<FieldValue>`.
pub trait Interpolate: Sized {
    fn lerp_between(
        target: DateTime<Utc>,
        t1: DateTime<Utc>,
        v1: &Self,
        t2: DateTime<Utc>,
        v2: &Self,
    ) -> Result<Self>;
}

impl<V: SeriesValue> Interpolate for V {
    fn lerp_between(
        target: DateTime<Utc>,
        t1: DateTime<Utc>,
        v1: &Self,
        t2: DateTime<Utc>,
        v2: &Self,
    ) -> Result<Self> {
        interpolate(target, t1, *v1, t2, *v2)
    }
}

impl Interpolate for Vec<FieldValue> {
    fn lerp_between(
        target: DateTime<Utc>,
        t1: DateTime<Utc>,
        v1: &Self,
        t2: DateTime<Utc>,
        v2: &Self,
    ) -> Result<Self> {
        interpolate_fields(target, t1, v1, t2, v2)
    }
}
