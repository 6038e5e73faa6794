//! Pull-based lazy sequences
//!
//! Every pipeline stage in this crate is a [`Pull`]: "produce the next
//! element, signal end-of-sequence, or fail". A consumer advances the
//! pipeline strictly one element at a time; no stage computes an element
//! until asked, and there is no internal parallelism or background work.
//!
//! Cancellation is cooperative: a [`StreamContext`] is threaded through every
//! pull call and checked before each element is produced. Once observed, the
//! pipeline stops producing and surfaces [`TimegridError::Cancelled`] as its
//! terminal error.
//!
//! The module also carries the sequence primitives the alignment engine is
//! built on: iterator sources, [`Map`], [`Chain`] (sequential concatenation),
//! [`Deferred`] (a single-value lazy computation, pulled at most once), the
//! clustering stage in [`cluster`], and the sorted merge joins in [`join`].

pub mod cluster;
pub mod join;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TimegridError};

/// Cooperative cancellation and deadline handle.
///
/// Clones share the same cancellation flag, so one clone can be handed to the
/// owner of the pipeline while another travels down the pull calls.
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<DateTime<Utc>>,
}

impl StreamContext {
    /// Create a context that is never cancelled until [`cancel`](Self::cancel)
    /// is called
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context that cancels itself once `deadline` has passed
    pub fn with_deadline(deadline: DateTime<Utc>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Signal cancellation; every stage observing this context stops
    /// producing elements
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancelled or past the deadline
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Utc::now() > deadline,
            None => false,
        }
    }

    /// Fail with [`TimegridError::Cancelled`] once the context is cancelled.
    /// Called by every stage before producing an element.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TimegridError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A lazy, single-consumer, pull-based sequence.
///
/// `Ok(Some(item))` produces the next element, `Ok(None)` is the
/// end-of-sequence sentinel, `Err` terminates the pipeline. A sequence must
/// not be pulled again after it returned an error.
pub trait Pull {
    type Item;

    /// Produce the next element, checking `ctx` before doing any work
    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Self::Item>>;
}

impl<P: Pull + ?Sized> Pull for Box<P> {
    type Item = P::Item;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Self::Item>> {
        (**self).pull(ctx)
    }
}

impl<P: Pull + ?Sized> Pull for &mut P {
    type Item = P::Item;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Self::Item>> {
        (**self).pull(ctx)
    }
}

/// Boxed pull sequence, used where inputs of differing concrete types must
/// share one collection (the join engine)
pub type BoxPull<T> = Box<dyn Pull<Item = T>>;

/// Adapter combinators available on every sequence
pub trait PullExt: Pull + Sized {
    /// Transform each element
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> U,
    {
        Map { source: self, f }
    }

    /// Concatenate another sequence after this one
    fn chain<B>(self, other: B) -> Chain<Self, B>
    where
        B: Pull<Item = Self::Item>,
    {
        Chain {
            first: self,
            second: other,
            first_done: false,
        }
    }

    /// Erase the concrete type
    fn boxed(self) -> BoxPull<Self::Item>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<P: Pull + Sized> PullExt for P {}

/// Source over any iterator
#[derive(Debug)]
pub struct IterSource<I> {
    iter: I,
}

/// Create a sequence from an iterator or collection
pub fn from_iter<I: IntoIterator>(iter: I) -> IterSource<I::IntoIter> {
    IterSource {
        iter: iter.into_iter(),
    }
}

impl<I: Iterator> Pull for IterSource<I> {
    type Item = I::Item;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Self::Item>> {
        ctx.checkpoint()?;
        Ok(self.iter.next())
    }
}

/// One-to-one element transformation
#[derive(Debug)]
pub struct Map<S, F> {
    source: S,
    f: F,
}

impl<S, F, U> Pull for Map<S, F>
where
    S: Pull,
    F: FnMut(S::Item) -> U,
{
    type Item = U;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<U>> {
        ctx.checkpoint()?;
        Ok(self.source.pull(ctx)?.map(&mut self.f))
    }
}

/// Sequential concatenation of two sequences
#[derive(Debug)]
pub struct Chain<A, B> {
    first: A,
    second: B,
    first_done: bool,
}

impl<A, B> Chain<A, B>
where
    A: Pull,
    B: Pull<Item = A::Item>,
{
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            first_done: false,
        }
    }
}

impl<A, B> Pull for Chain<A, B>
where
    A: Pull,
    B: Pull<Item = A::Item>,
{
    type Item = A::Item;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<Self::Item>> {
        ctx.checkpoint()?;
        if !self.first_done {
            if let Some(item) = self.first.pull(ctx)? {
                return Ok(Some(item));
            }
            self.first_done = true;
        }
        self.second.pull(ctx)
    }
}

/// A single-value deferred computation: runs its closure on the first pull,
/// yields whatever it returns, then ends.
///
/// Used to append values that only become known once an upstream sequence has
/// been fully drained, such as the aligned-delta pipeline's synthetic tail.
pub struct Deferred<F> {
    f: Option<F>,
}

impl<F> Deferred<F> {
    pub fn new(f: F) -> Self {
        Self { f: Some(f) }
    }
}

impl<F, T> Pull for Deferred<F>
where
    F: FnOnce(&StreamContext) -> Result<Option<T>>,
{
    type Item = T;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<T>> {
        ctx.checkpoint()?;
        match self.f.take() {
            Some(f) => f(ctx),
            None => Ok(None),
        }
    }
}

impl<F> std::fmt::Debug for Deferred<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("pending", &self.f.is_some())
            .finish()
    }
}

/// Drain a sequence to completion, collecting every element.
///
/// Test and terminal-consumer helper; intermediate stages never buffer this
/// way.
pub fn drain<S: Pull>(stream: &mut S, ctx: &StreamContext) -> Result<Vec<S::Item>> {
    let mut out = Vec::new();
    while let Some(item) = stream.pull(ctx)? {
        out.push(item);
    }
    Ok(out)
}
