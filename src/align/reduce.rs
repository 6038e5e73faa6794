//! Reduce alignment: one caller-defined reduction per bucket
//!
//! [`align_reduce`] buckets exactly like [`align`](super::align) but hands
//! each bucket to a [`BucketReducer`] instead of interpolating. A reducer
//! consumes the bucket's samples incrementally and produces the single
//! representative sample once the bucket is exhausted.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, TimegridError};
use crate::period::AlignmentPeriod;
use crate::sample::{Sample, SeriesValue};
use crate::stream::cluster::cluster_by;
use crate::stream::{Pull, StreamContext};

/// Per-bucket reduction over the samples classified into one bucket.
///
/// Implemented by the built-in reducers and by any
/// `FnMut(bucket_start, samples, ctx) -> Result<Sample<V>>` closure.
pub trait BucketReducer<V> {
    /// Consume the bucket's samples and produce its representative sample
    fn reduce(
        &mut self,
        bucket_start: DateTime<Utc>,
        samples: &mut dyn Pull<Item = Sample<V>>,
        ctx: &StreamContext,
    ) -> Result<Sample<V>>;
}

impl<V, F> BucketReducer<V> for F
where
    F: FnMut(DateTime<Utc>, &mut dyn Pull<Item = Sample<V>>, &StreamContext) -> Result<Sample<V>>,
{
    fn reduce(
        &mut self,
        bucket_start: DateTime<Utc>,
        samples: &mut dyn Pull<Item = Sample<V>>,
        ctx: &StreamContext,
    ) -> Result<Sample<V>> {
        self(bucket_start, samples, ctx)
    }
}

/// Align a sorted sample stream with a caller-supplied per-bucket reducer
pub fn align_reduce<S, V, Tz, R>(
    source: S,
    period: AlignmentPeriod<Tz>,
    mut reducer: R,
) -> impl Pull<Item = Sample<V>>
where
    S: Pull<Item = Sample<V>>,
    V: Clone,
    Tz: TimeZone,
    R: BucketReducer<V>,
{
    let classify_period = period.clone();
    let classify = move |sample: &Sample<V>| classify_period.start(sample.timestamp);
    let bucket_fn = move |bucket_start: &DateTime<Utc>,
                          bucket: &mut dyn Pull<Item = Sample<V>>,
                          _prev: Option<&Sample<V>>,
                          ctx: &StreamContext| {
        reducer.reduce(*bucket_start, bucket, ctx)
    };
    cluster_by(source, classify, bucket_fn)
}

/// Reducer emitting the bucket's maximum value, timestamped at the bucket
/// start
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxReducer;

impl<V: SeriesValue> BucketReducer<V> for MaxReducer {
    fn reduce(
        &mut self,
        bucket_start: DateTime<Utc>,
        samples: &mut dyn Pull<Item = Sample<V>>,
        ctx: &StreamContext,
    ) -> Result<Sample<V>> {
        let first = samples.pull(ctx)?.ok_or(TimegridError::EmptyCluster {
            bucket: bucket_start,
        })?;
        let mut max = first.value;
        while let Some(sample) = samples.pull(ctx)? {
            if sample.value > max {
                max = sample.value;
            }
        }
        Ok(Sample::new(bucket_start, max))
    }
}

/// Reducer emitting the bucket's running mean, timestamped at the bucket
/// start.
///
/// The mean is computed incrementally as `avg * n/(n+1) + v/(n+1)` so a
/// bucket is consumed in a single pass with no second traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvgReducer;

impl<V: SeriesValue> BucketReducer<V> for AvgReducer {
    fn reduce(
        &mut self,
        bucket_start: DateTime<Utc>,
        samples: &mut dyn Pull<Item = Sample<V>>,
        ctx: &StreamContext,
    ) -> Result<Sample<V>> {
        let mut avg = 0.0f64;
        let mut n = 0u64;
        while let Some(sample) = samples.pull(ctx)? {
            let next = (n + 1) as f64;
            avg = avg * (n as f64 / next) + sample.value.to_f64() / next;
            n += 1;
        }
        if n == 0 {
            return Err(TimegridError::EmptyCluster {
                bucket: bucket_start,
            });
        }
        Ok(Sample::new(bucket_start, V::from_f64(avg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{drain, from_iter};
    use chrono::Duration;

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
    fn test_max_reducer_takes_bucket_maximum() {
        let ctx = StreamContext::new();
        let samples = vec![
            sample(5, 3.0),
            sample(20, 9.0),
            sample(50, 7.0),
            sample(65, 1.0),
        ];
        let mut reduced = align_reduce(from_iter(samples), minute_period(), MaxReducer);
        let out = drain(&mut reduced, &ctx).unwrap();
        assert_eq!(out, vec![sample(0, 9.0), sample(60, 1.0)]);
    }

    #[test]
    fn test_avg_reducer_incremental_mean() {
        let ctx = StreamContext::new();
        let samples = vec![sample(5, 10.0), sample(20, 20.0), sample(50, 30.0)];
        let mut reduced = align_reduce(from_iter(samples), minute_period(), AvgReducer);
        let out = drain(&mut reduced, &ctx).unwrap();
        assert_eq!(out, vec![sample(0, 20.0)]);
    }

    #[test]
    fn test_avg_reducer_integer_truncates() {
        let ctx = StreamContext::new();
        let samples = vec![Sample::new(ts(5), 1i64), Sample::new(ts(20), 2i64)];
        let mut reduced = align_reduce(from_iter(samples), minute_period(), AvgReducer);
        let out = drain(&mut reduced, &ctx).unwrap();
        // mean 1.5 truncates to 1
        assert_eq!(out, vec![Sample::new(ts(0), 1i64)]);
    }

    #[test]
    fn test_closure_reducer_counts_bucket() {
        let ctx = StreamContext::new();
        let samples = vec![sample(5, 1.0), sample(20, 1.0), sample(65, 1.0)];
        let mut reduced = align_reduce(
            from_iter(samples),
            minute_period(),
            |bucket_start: DateTime<Utc>,
             bucket: &mut dyn Pull<Item = Sample<f64>>,
             ctx: &StreamContext| {
                let mut count = 0.0;
                while bucket.pull(ctx)?.is_some() {
                    count += 1.0;
                }
                Ok(Sample::new(bucket_start, count))
            },
        );
        let out = drain(&mut reduced, &ctx).unwrap();
        assert_eq!(out, vec![sample(0, 2.0), sample(60, 1.0)]);
    }
}
