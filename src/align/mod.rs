//! Cluster alignment of sorted sample streams
//!
//! [`align`] buckets a sorted sample stream by alignment period and emits
//! exactly one representative sample per occupied bucket, timestamped at the
//! bucket start:
//!
//! - the very first bucket "smudges": the first observed value is assumed to
//!   have held since the start of the observation window, no interpolation
//! - a bucket whose first raw sample sits exactly on the boundary passes it
//!   through unchanged
//! - any other bucket interpolates between the previous bucket's emitted
//!   sample and the bucket's first raw sample
//!
//! Later raw samples inside a bucket are consumed and discarded. Empty
//! buckets cannot occur (buckets exist only where samples do); if the
//! clustering stage ever hands over an empty bucket the aligner fails with
//! [`TimegridError::EmptyCluster`].

pub mod reduce;

use chrono::{DateTime, TimeZone, Utc};
use tracing::trace;

use crate::error::{Result, TimegridError};
use crate::interpolate::Interpolate;
use crate::period::AlignmentPeriod;
use crate::sample::Sample;
use crate::stream::cluster::cluster_by;
use crate::stream::{Pull, StreamContext};

/// Align a sorted sample stream to one sample per occupied period bucket.
///
/// Output is sorted, one record per bucket, each timestamped at its bucket
/// start.
pub fn align<S, V, Tz>(
    source: S,
    period: AlignmentPeriod<Tz>,
) -> impl Pull<Item = Sample<V>>
where
    S: Pull<Item = Sample<V>>,
    V: Interpolate + Clone,
    Tz: TimeZone,
{
    let classify_period = period.clone();
    let classify = move |sample: &Sample<V>| classify_period.start(sample.timestamp);
    let bucket_fn = |bucket_start: &DateTime<Utc>,
                     bucket: &mut dyn Pull<Item = Sample<V>>,
                     prev: Option<&Sample<V>>,
                     ctx: &StreamContext| {
        let out = align_bucket(bucket_start, bucket, prev, ctx)?;
        trace!(bucket = %bucket_start, "align: bucket emitted");
        Ok(out)
    };
    cluster_by(source, classify, bucket_fn)
}

fn align_bucket<V: Interpolate + Clone>(
    bucket_start: &DateTime<Utc>,
    bucket: &mut dyn Pull<Item = Sample<V>>,
    prev: Option<&Sample<V>>,
    ctx: &StreamContext,
) -> Result<Sample<V>> {
    let first = bucket.pull(ctx)?.ok_or(TimegridError::EmptyCluster {
        bucket: *bucket_start,
    })?;
    match prev {
        // first bucket ever: smudge the first observed value back to the
        // bucket start, no interpolation
        None => Ok(Sample::new(*bucket_start, first.value)),
        Some(_) if first.timestamp == *bucket_start => Ok(first),
        Some(prev) => {
            let value = V::lerp_between(
                *bucket_start,
                prev.timestamp,
                &prev.value,
                first.timestamp,
                &first.value,
            )?;
            Ok(Sample::new(*bucket_start, value))
        }
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
    fn test_align_boundary_samples_pass_through() {
        let ctx = StreamContext::new();
        let samples = vec![
            sample(0, 100.0),
            sample(60, 150.0),
            sample(120, 200.0),
            sample(180, 250.0),
        ];
        let mut aligned = align(from_iter(samples.clone()), minute_period());
        assert_eq!(drain(&mut aligned, &ctx).unwrap(), samples);
    }

    #[test]
    fn test_align_smudges_first_and_interpolates_rest() {
        let ctx = StreamContext::new();
        let samples = vec![sample(45, 100.0), sample(105, 200.0)];
        let mut aligned = align(from_iter(samples), minute_period());
        let out = drain(&mut aligned, &ctx).unwrap();
        // 125 = 100 + (200 - 100) * 15 / 60
        assert_eq!(out, vec![sample(0, 100.0), sample(60, 125.0)]);
    }

    #[test]
    fn test_align_one_record_per_occupied_bucket() {
        let ctx = StreamContext::new();
        let samples = vec![
            sample(0, 1.0),
            sample(10, 2.0),
            sample(50, 3.0),
            sample(60, 4.0),
            sample(61, 5.0),
        ];
        let mut aligned = align(from_iter(samples), minute_period());
        let out = drain(&mut aligned, &ctx).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], sample(0, 1.0));
        assert_eq!(out[1], sample(60, 4.0));
    }

    #[test]
    fn test_align_skipped_buckets_stay_absent() {
        let ctx = StreamContext::new();
        // nothing lands in [60, 120); output has no bucket for it
        let samples = vec![sample(0, 100.0), sample(130, 200.0)];
        let mut aligned = align(from_iter(samples), minute_period());
        let out = drain(&mut aligned, &ctx).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp, ts(0));
        assert_eq!(out[1].timestamp, ts(120));
        // interpolated at 120 between (0, 100) and (130, 200)
        let expected = 100.0 + 100.0 * 120.0 / 130.0;
        assert!((out[1].value - expected).abs() < 1e-9);
    }

    #[test]
    fn test_align_integer_values_truncate() {
        let ctx = StreamContext::new();
        let samples = vec![
            Sample::new(ts(45), 0i64),
            Sample::new(ts(105), 5i64),
        ];
        let mut aligned = align(from_iter(samples), minute_period());
        let out = drain(&mut aligned, &ctx).unwrap();
        // interpolated 5 * 15 / 60 = 1.25 truncates to 1
        assert_eq!(out, vec![Sample::new(ts(0), 0), Sample::new(ts(60), 1)]);
    }

    #[test]
    fn test_align_empty_source() {
        let ctx = StreamContext::new();
        let mut aligned = align(from_iter(Vec::<Sample<f64>>::new()), minute_period());
        assert!(drain(&mut aligned, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_align_multi_field_samples() {
        use crate::sample::FieldValue;
        let ctx = StreamContext::new();
        let samples = vec![
            Sample::new(ts(45), vec![FieldValue::F64(100.0), FieldValue::I64(0)]),
            Sample::new(ts(105), vec![FieldValue::F64(200.0), FieldValue::I64(60)]),
        ];
        let mut aligned = align(from_iter(samples), minute_period());
        let out = drain(&mut aligned, &ctx).unwrap();
        assert_eq!(out[0].value, vec![FieldValue::F64(100.0), FieldValue::I64(0)]);
        assert_eq!(out[1].value, vec![FieldValue::F64(125.0), FieldValue::I64(15)]);
    }
}
