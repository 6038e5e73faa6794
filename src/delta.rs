//! Successive differences and the aligned-delta pipeline
//!
//! [`delta`] turns any strictly-increasing-timestamp sample stream into the
//! stream of successive differences. [`align_and_delta`] composes the
//! cluster aligner with a synthetic tail sample that completes the final,
//! possibly partial, bucket so the delta accrued during it is not lost.

use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::align::align;
use crate::error::{Result, TimegridError};
use crate::period::AlignmentPeriod;
use crate::sample::{Sample, SeriesValue};
use crate::stream::{Chain, Deferred, Pull, StreamContext};

/// Successive-difference pipeline stage; see [`delta`]
#[derive(Debug)]
pub struct Delta<S, V> {
    source: S,
    prev: Option<Sample<V>>,
}

/// Emit the difference between each sample and its predecessor.
///
/// The first incoming sample is stored and produces no output. Timestamps
/// must strictly increase; a stalled or regressing timestamp fails the
/// stream with [`TimegridError::NonMonotonicTimestamp`].
pub fn delta<S, V>(source: S) -> Delta<S, V>
where
    S: Pull<Item = Sample<V>>,
    V: SeriesValue,
{
    Delta { source, prev: None }
}

impl<S, V> Pull for Delta<S, V>
where
    S: Pull<Item = Sample<V>>,
    V: SeriesValue,
{
    type Item = Sample<V>;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Sample<V>>> {
        ctx.checkpoint()?;
        loop {
            let Some(sample) = self.source.pull(ctx)? else {
                return Ok(None);
            };
            match self.prev {
                None => {
                    // first sample: establish the baseline, emit nothing
                    self.prev = Some(sample);
                }
                Some(prev) => {
                    if sample.timestamp <= prev.timestamp {
                        return Err(TimegridError::NonMonotonicTimestamp {
                            prev: prev.timestamp,
                            next: sample.timestamp,
                        });
                    }
                    let diff = V::from_f64(sample.value.to_f64() - prev.value.to_f64());
                    self.prev = Some(sample);
                    return Ok(Some(Sample::new(sample.timestamp, diff)));
                }
            }
        }
    }
}

/// Last raw sample seen by the tap, plus how many distinct timestamps passed
/// through
#[derive(Debug)]
struct RawSpan<V> {
    last: Option<Sample<V>>,
    distinct: u64,
}

impl<V> Default for RawSpan<V> {
    fn default() -> Self {
        Self {
            last: None,
            distinct: 0,
        }
    }
}

/// Pass-through stage recording the raw stream's span for the tail stage
struct Tap<S, V> {
    source: S,
    span: Arc<Mutex<RawSpan<V>>>,
}

impl<S, V> Pull for Tap<S, V>
where
    S: Pull<Item = Sample<V>>,
    V: SeriesValue,
{
    type Item = Sample<V>;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Sample<V>>> {
        let item = self.source.pull(ctx)?;
        if let Some(sample) = &item {
            let mut span = self.span.lock().expect("raw span lock poisoned");
            let advances = span
                .last
                .map_or(true, |last| last.timestamp != sample.timestamp);
            if advances {
                span.distinct += 1;
            }
            span.last = Some(*sample);
        }
        Ok(item)
    }
}

/// Align a raw sample stream and emit per-period deltas, completing the
/// final partial bucket.
///
/// After the aligned stream completes, one synthetic trailing sample
/// `{period.end(last.timestamp), last.value}` is appended when the last raw
/// sample does not itself sit on a bucket boundary, so the delta accrued in
/// the trailing partial period is accounted for. A stream with fewer than
/// two distinct raw samples produces no output at all.
pub fn align_and_delta<S, V, Tz>(
    source: S,
    period: AlignmentPeriod<Tz>,
) -> impl Pull<Item = Sample<V>>
where
    S: Pull<Item = Sample<V>>,
    V: SeriesValue,
    Tz: TimeZone,
{
    let span = Arc::new(Mutex::new(RawSpan::default()));
    let tapped = Tap {
        source,
        span: Arc::clone(&span),
    };
    let aligned = align(tapped, period.clone());
    let tail = Deferred::new(move |_ctx: &StreamContext| {
        let span = span.lock().expect("raw span lock poisoned");
        if span.distinct < 2 {
            return Ok(None);
        }
        let Some(last) = span.last else {
            return Ok(None);
        };
        if period.start(last.timestamp) == last.timestamp {
            trace!("aligned delta: last sample on boundary, no tail");
            return Ok(None);
        }
        let tail = Sample::new(period.end(last.timestamp), last.value);
        debug!(tail = %tail.timestamp, "aligned delta: completing final partial bucket");
        Ok(Some(tail))
    });
    delta(Chain::new(aligned, tail))
}

/// [`align_and_delta`] keyed by a raw fixed duration in UTC.
///
/// # Panics
/// Panics when `bucket` is not strictly positive.
#[deprecated(note = "use align_and_delta with an AlignmentPeriod")]
pub fn align_and_delta_fixed<S, V>(
    source: S,
    bucket: chrono::Duration,
) -> impl Pull<Item = Sample<V>>
where
    S: Pull<Item = Sample<V>>,
    V: SeriesValue,
{
    align_and_delta(source, AlignmentPeriod::fixed(bucket, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{drain, from_iter};
    use chrono::{DateTime, Duration};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample(secs: i64, value: f64) -> Sample<f64> {
        Sample::new(ts(secs), value)
    }

    fn minute_period() -> AlignmentPeriod<Utc> {
        AlignmentPeriod::fixed(Duration::seconds(60), Utc)
    }

    #[test]
    fn test_delta_successive_differences() {
        let ctx = StreamContext::new();
        let samples: Vec<_> = (0..6).map(|i| sample(i * 60, 100.0 + 50.0 * i as f64)).collect();
        let mut deltas = delta(from_iter(samples));
        let out = drain(&mut deltas, &ctx).unwrap();
        assert_eq!(out.len(), 5);
        for (i, d) in out.iter().enumerate() {
            assert_eq!(d.timestamp, ts((i as i64 + 1) * 60));
            assert_eq!(d.value, 50.0);
        }
    }

    #[test]
    fn test_delta_single_sample_empty() {
        let ctx = StreamContext::new();
        let mut deltas = delta(from_iter(vec![sample(0, 1.0)]));
        assert!(drain(&mut deltas, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_delta_negative_differences() {
        let ctx = StreamContext::new();
        let mut deltas = delta(from_iter(vec![sample(0, 10.0), sample(60, 4.0)]));
        let out = drain(&mut deltas, &ctx).unwrap();
        assert_eq!(out, vec![sample(60, -6.0)]);
    }

    #[test]
    fn test_delta_rejects_non_monotonic_input() {
        let ctx = StreamContext::new();
        let mut deltas = delta(from_iter(vec![sample(60, 1.0), sample(60, 2.0)]));
        let err = deltas.pull(&ctx).unwrap_err();
        assert_eq!(
            err,
            TimegridError::NonMonotonicTimestamp {
                prev: ts(60),
                next: ts(60),
            }
        );
    }

    #[test]
    fn test_align_and_delta_completes_partial_bucket() {
        let ctx = StreamContext::new();
        let samples = vec![sample(45, 100.0), sample(105, 200.0)];
        let mut pipeline = align_and_delta(from_iter(samples), minute_period());
        let out = drain(&mut pipeline, &ctx).unwrap();
        // aligned: (0, 100) smeared, (60, 125); tail (120, 200)
        assert_eq!(out, vec![sample(60, 25.0), sample(120, 75.0)]);
    }

    #[test]
    fn test_align_and_delta_single_sample_empty() {
        let ctx = StreamContext::new();
        let mut pipeline = align_and_delta(from_iter(vec![sample(45, 100.0)]), minute_period());
        assert!(drain(&mut pipeline, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_align_and_delta_no_tail_on_boundary() {
        let ctx = StreamContext::new();
        let samples = vec![sample(0, 100.0), sample(60, 150.0), sample(120, 200.0)];
        let mut pipeline = align_and_delta(from_iter(samples), minute_period());
        let out = drain(&mut pipeline, &ctx).unwrap();
        assert_eq!(out, vec![sample(60, 50.0), sample(120, 50.0)]);
    }

    #[test]
    fn test_align_and_delta_empty_source() {
        let ctx = StreamContext::new();
        let mut pipeline =
            align_and_delta(from_iter(Vec::<Sample<f64>>::new()), minute_period());
        assert!(drain(&mut pipeline, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_align_and_delta_fixed_wrapper() {
        let ctx = StreamContext::new();
        let samples = vec![sample(45, 100.0), sample(105, 200.0)];
        #[allow(deprecated)]
        let mut pipeline = align_and_delta_fixed(from_iter(samples), Duration::seconds(60));
        let out = drain(&mut pipeline, &ctx).unwrap();
        assert_eq!(out, vec![sample(60, 25.0), sample(120, 75.0)]);
    }
}
