//! Gap filling: densify a sparse aligned stream to one record per period
//!
//! The gap filler consumes the one-record-per-occupied-bucket output of the
//! aligner and emits exactly one record per period slot between the first
//! and last occupied bucket, inclusive. Absent slots are filled by linear
//! interpolation or by repeating the last known value, per [`FillMode`]. It
//! never extrapolates past the last observed sample.
//!
//! The stage keeps an explicit one-element lookahead: `next` is the sample
//! pulled ahead of the current emission and `prev` the last sample at or
//! behind the expected slot. Fill values are produced by caller-supplied
//! functions; forward-fill copies the previous value rather than aliasing
//! it, so later mutation of reference-like values cannot bleed backward.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::{Result, TimegridError};
use crate::interpolate::Interpolate;
use crate::period::AlignmentPeriod;
use crate::sample::Sample;
use crate::stream::{Pull, StreamContext};

/// Policy for filling absent period slots
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Linear interpolation between the bracketing samples
    Linear,
    /// Repeat the last known value
    ForwardFill,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillMode::Linear => write!(f, "linear"),
            FillMode::ForwardFill => write!(f, "forward_fill"),
        }
    }
}

/// Gap-filling pipeline stage; see [`fill_gaps`]
pub struct GapFiller<S, Tz, V, L, C>
where
    S: Pull<Item = Sample<V>>,
    Tz: TimeZone,
{
    source: S,
    period: AlignmentPeriod<Tz>,
    mode: FillMode,
    lerp: L,
    copy: C,
    prev: Option<Sample<V>>,
    next: Option<Sample<V>>,
    expected: Option<DateTime<Utc>>,
    started: bool,
    exhausted: bool,
}

/// Densify a sparse aligned stream with caller-supplied fill functions.
///
/// `lerp(expected, prev, next)` produces the fill value under
/// [`FillMode::Linear`]; `copy(&prev.value)` under [`FillMode::ForwardFill`].
/// Output covers every period slot from the first source record through the
/// last, inclusive; the stage terminates instead of extrapolating beyond the
/// last observed sample.
pub fn fill_gaps<S, Tz, V, L, C>(
    source: S,
    period: AlignmentPeriod<Tz>,
    mode: FillMode,
    lerp: L,
    copy: C,
) -> GapFiller<S, Tz, V, L, C>
where
    S: Pull<Item = Sample<V>>,
    Tz: TimeZone,
    V: Clone,
    L: FnMut(DateTime<Utc>, &Sample<V>, &Sample<V>) -> Result<V>,
    C: FnMut(&V) -> V,
{
    GapFiller {
        source,
        period,
        mode,
        lerp,
        copy,
        prev: None,
        next: None,
        expected: None,
        started: false,
        exhausted: false,
    }
}

/// [`fill_gaps`] with [`FillMode::Linear`] and the value type's own
/// interpolation
pub fn fill_gaps_linear<S, Tz, V>(
    source: S,
    period: AlignmentPeriod<Tz>,
) -> GapFiller<
    S,
    Tz,
    V,
    impl FnMut(DateTime<Utc>, &Sample<V>, &Sample<V>) -> Result<V>,
    impl FnMut(&V) -> V,
>
where
    S: Pull<Item = Sample<V>>,
    Tz: TimeZone,
    V: Interpolate + Clone,
{
    fill_gaps(source, period, FillMode::Linear, interpolate_fill, V::clone)
}

/// [`fill_gaps`] with [`FillMode::ForwardFill`] and plain value cloning
pub fn fill_gaps_forward<S, Tz, V>(
    source: S,
    period: AlignmentPeriod<Tz>,
) -> GapFiller<
    S,
    Tz,
    V,
    impl FnMut(DateTime<Utc>, &Sample<V>, &Sample<V>) -> Result<V>,
    impl FnMut(&V) -> V,
>
where
    S: Pull<Item = Sample<V>>,
    Tz: TimeZone,
    V: Interpolate + Clone,
{
    fill_gaps(
        source,
        period,
        FillMode::ForwardFill,
        interpolate_fill,
        V::clone,
    )
}

fn interpolate_fill<V: Interpolate>(
    target: DateTime<Utc>,
    prev: &Sample<V>,
    next: &Sample<V>,
) -> Result<V> {
    V::lerp_between(target, prev.timestamp, &prev.value, next.timestamp, &next.value)
}

impl<S, Tz, V, L, C> Pull for GapFiller<S, Tz, V, L, C>
where
    S: Pull<Item = Sample<V>>,
    Tz: TimeZone,
    V: Clone,
    L: FnMut(DateTime<Utc>, &Sample<V>, &Sample<V>) -> Result<V>,
    C: FnMut(&V) -> V,
{
    type Item = Sample<V>;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Sample<V>>> {
        ctx.checkpoint()?;
        if self.exhausted {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            match self.source.pull(ctx)? {
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Some(first) => {
                    self.expected = Some(first.timestamp);
                    self.next = Some(first);
                }
            }
        }
        let Some(expected) = self.expected else {
            return Ok(None);
        };

        // shift the lookahead until `next` is strictly ahead of the slot
        while matches!(&self.next, Some(next) if next.timestamp <= expected) {
            self.prev = self.next.take();
            self.next = self.source.pull(ctx)?;
        }

        let Some(prev) = self.prev.as_ref() else {
            self.exhausted = true;
            return Ok(None);
        };

        if prev.timestamp == expected {
            // real sample sits exactly on the slot
            let out = Sample::new(expected, prev.value.clone());
            self.expected = Some(self.period.end(expected));
            if self.next.is_none() {
                // last real sample emitted; the following pull terminates
                self.exhausted = true;
            }
            return Ok(Some(out));
        }

        let Some(next) = self.next.as_ref() else {
            // past the last real sample: never extrapolate
            self.exhausted = true;
            return Ok(None);
        };

        let value = match self.mode {
            FillMode::Linear => (self.lerp)(expected, prev, next)?,
            FillMode::ForwardFill => (self.copy)(&prev.value),
            #[allow(unreachable_patterns)]
            other => {
                return Err(TimegridError::UnsupportedFillMode {
                    mode: other.to_string(),
                })
            }
        };
        trace!(slot = %expected, mode = %self.mode, "gap fill: slot filled");
        self.expected = Some(self.period.end(expected));
        Ok(Some(Sample::new(expected, value)))
    }
}
