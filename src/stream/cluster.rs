//! Clustering of sorted sequences by a classifier key
//!
//! [`cluster_by`] partitions a sorted source into runs of equal classifier
//! keys ("buckets") and invokes a bucket callback once per distinct key, in
//! order. The callback receives a lending sub-sequence over the bucket's
//! elements and the callback's own most recent output for the previous
//! bucket. Exactly one element of lookahead is buffered: the first element of
//! the next bucket, spilled while the current bucket is being consumed.

use tracing::trace;

use super::{Pull, StreamContext};
use crate::error::Result;

/// Pipeline stage produced by [`cluster_by`]
pub struct ClusterBy<S, C, F, K, T>
where
    S: Pull,
{
    source: S,
    classify: C,
    bucket_fn: F,
    lookahead: Option<S::Item>,
    prev_out: Option<T>,
    started: bool,
    done: bool,
    _key: std::marker::PhantomData<K>,
}

/// Partition a sorted `source` into buckets of equal classifier key.
///
/// `bucket_fn(key, bucket, previous_output, ctx)` is called once per distinct
/// key, in source order. The `bucket` sub-sequence lends only elements whose
/// classifier equals `key`, in original order; elements the callback does not
/// consume are drained and discarded before the next bucket starts.
/// `previous_output` is the callback's own output for the immediately
/// preceding bucket, `None` for the first bucket ever.
pub fn cluster_by<S, C, F, K, T>(source: S, classify: C, bucket_fn: F) -> ClusterBy<S, C, F, K, T>
where
    S: Pull,
    C: Fn(&S::Item) -> K,
    K: PartialEq,
    F: FnMut(&K, &mut dyn Pull<Item = S::Item>, Option<&T>, &StreamContext) -> Result<T>,
    T: Clone,
{
    ClusterBy {
        source,
        classify,
        bucket_fn,
        lookahead: None,
        prev_out: None,
        started: false,
        done: false,
        _key: std::marker::PhantomData,
    }
}

impl<S, C, F, K, T> Pull for ClusterBy<S, C, F, K, T>
where
    S: Pull,
    C: Fn(&S::Item) -> K,
    K: PartialEq,
    F: FnMut(&K, &mut dyn Pull<Item = S::Item>, Option<&T>, &StreamContext) -> Result<T>,
    T: Clone,
{
    type Item = T;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<T>> {
        ctx.checkpoint()?;
        if self.done {
            return Ok(None);
        }
        if !self.started {
            self.lookahead = self.source.pull(ctx)?;
            self.started = true;
        }
        let Some(head) = self.lookahead.take() else {
            self.done = true;
            return Ok(None);
        };

        let key = (self.classify)(&head);
        let (out, spill) = {
            let mut bucket = BucketItems {
                key: &key,
                classify: &self.classify,
                head: Some(head),
                source: &mut self.source,
                spill: None,
                source_exhausted: false,
            };
            let out = (self.bucket_fn)(&key, &mut bucket, self.prev_out.as_ref(), ctx)?;
            // discard whatever the callback left unconsumed
            while bucket.pull(ctx)?.is_some() {}
            (out, bucket.spill)
        };
        trace!("cluster: bucket closed");
        self.lookahead = spill;
        self.prev_out = Some(out.clone());
        Ok(Some(out))
    }
}

/// Lending sub-sequence over one bucket's elements.
///
/// Yields the bucket's first element, then pulls from the shared source until
/// an element classifies into a different bucket; that element is spilled
/// back to the parent stage rather than consumed.
struct BucketItems<'a, S: Pull, C, K> {
    key: &'a K,
    classify: &'a C,
    head: Option<S::Item>,
    source: &'a mut S,
    spill: Option<S::Item>,
    source_exhausted: bool,
}

impl<'a, S, C, K> Pull for BucketItems<'a, S, C, K>
where
    S: Pull,
    C: Fn(&S::Item) -> K,
    K: PartialEq,
{
    type Item = S::Item;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<S::Item>> {
        ctx.checkpoint()?;
        if let Some(item) = self.head.take() {
            return Ok(Some(item));
        }
        if self.source_exhausted || self.spill.is_some() {
            return Ok(None);
        }
        match self.source.pull(ctx)? {
            None => {
                self.source_exhausted = true;
                Ok(None)
            }
            Some(item) => {
                if (self.classify)(&item) == *self.key {
                    Ok(Some(item))
                } else {
                    self.spill = Some(item);
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{drain, from_iter};

    #[test]
    fn test_cluster_by_groups_runs() {
        let ctx = StreamContext::new();
        let source = from_iter(vec![1, 2, 11, 12, 13, 21]);
        let mut clustered = cluster_by(
            source,
            |v: &i32| v / 10,
            |key: &i32, mut bucket: &mut dyn Pull<Item = i32>, _prev: Option<&(i32, Vec<i32>)>, ctx| {
                let items = drain(&mut bucket, ctx)?;
                Ok((*key, items))
            },
        );
        let out = drain(&mut clustered, &ctx).unwrap();
        assert_eq!(
            out,
            vec![(0, vec![1, 2]), (1, vec![11, 12, 13]), (2, vec![21])]
        );
    }

    #[test]
    fn test_cluster_by_threads_previous_output() {
        let ctx = StreamContext::new();
        let source = from_iter(vec![1, 11, 21]);
        let mut clustered = cluster_by(
            source,
            |v: &i32| v / 10,
            |_key, bucket: &mut dyn Pull<Item = i32>, prev: Option<&i32>, ctx| {
                let first = bucket.pull(ctx)?.unwrap_or(0);
                Ok(first + prev.copied().unwrap_or(0))
            },
        );
        let out = drain(&mut clustered, &ctx).unwrap();
        // 1, 1+11, 12+21
        assert_eq!(out, vec![1, 12, 33]);
    }

    #[test]
    fn test_cluster_by_discards_unconsumed_items() {
        let ctx = StreamContext::new();
        let source = from_iter(vec![1, 2, 3, 11, 12]);
        let mut clustered = cluster_by(
            source,
            |v: &i32| v / 10,
            |_key, bucket: &mut dyn Pull<Item = i32>, _prev: Option<&i32>, ctx| {
                // consume only the first element of each bucket
                Ok(bucket.pull(ctx)?.unwrap_or(0))
            },
        );
        let out = drain(&mut clustered, &ctx).unwrap();
        assert_eq!(out, vec![1, 11]);
    }

    #[test]
    fn test_cluster_by_empty_source() {
        let ctx = StreamContext::new();
        let source = from_iter(Vec::<i32>::new());
        let mut clustered = cluster_by(
            source,
            |v: &i32| *v,
            |_key, _bucket: &mut dyn Pull<Item = i32>, _prev: Option<&i32>, _ctx| Ok(0),
        );
        assert!(drain(&mut clustered, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_cluster_by_propagates_bucket_error() {
        let ctx = StreamContext::new();
        let source = from_iter(vec![1]);
        let mut clustered = cluster_by(
            source,
            |v: &i32| *v,
            |_key, _bucket: &mut dyn Pull<Item = i32>, _prev: Option<&i32>, _ctx| {
                Err::<i32, _>(crate::error::TimegridError::JoinWithoutInputs)
            },
        );
        assert!(clustered.pull(&ctx).is_err());
    }
}
