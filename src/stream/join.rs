//! N-way sorted merge joins
//!
//! Joins `N >= 1` sequences that are each sorted ascending and strictly
//! increasing by join key. The merge buffers exactly one head element per
//! input and never looks further ahead; ties inside a single input are
//! impossible because its keys strictly increase.
//!
//! Three flavors:
//! - [`inner_join_n`]: emit only at keys present in every input
//! - [`left_join_n`]: one output per element of input 0, optional matches
//!   from the rest
//! - [`full_join_n`]: emit at the union of all keys, every slot optional

use tracing::trace;

use super::{BoxPull, Pull, StreamContext};
use crate::error::{Result, TimegridError};

/// Shared head-buffer state over the join inputs
struct Heads<R> {
    inputs: Vec<BoxPull<R>>,
    heads: Vec<Option<R>>,
    primed: bool,
}

impl<R> Heads<R> {
    fn new(inputs: Vec<BoxPull<R>>) -> Self {
        let n = inputs.len();
        Self {
            inputs,
            heads: (0..n).map(|_| None).collect(),
            primed: false,
        }
    }

    fn prime(&mut self, ctx: &StreamContext) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(TimegridError::JoinWithoutInputs);
        }
        if !self.primed {
            for i in 0..self.inputs.len() {
                self.heads[i] = self.inputs[i].pull(ctx)?;
            }
            self.primed = true;
        }
        Ok(())
    }

    fn advance(&mut self, i: usize, ctx: &StreamContext) -> Result<()> {
        self.heads[i] = self.inputs[i].pull(ctx)?;
        Ok(())
    }
}

/// Inner join: emits one row per key present in every input
pub struct InnerJoin<R, KF, J> {
    state: Heads<R>,
    key_fn: KF,
    joiner: J,
    done: bool,
}

/// Join sorted sequences on keys present in all of them.
///
/// `joiner` receives the full ordered row of matched elements, one per
/// input, never absent.
pub fn inner_join_n<R, K, KF, J, T>(
    inputs: Vec<BoxPull<R>>,
    key_fn: KF,
    joiner: J,
) -> InnerJoin<R, KF, J>
where
    K: Ord,
    KF: Fn(&R) -> K,
    J: FnMut(Vec<R>) -> Result<T>,
{
    InnerJoin {
        state: Heads::new(inputs),
        key_fn,
        joiner,
        done: false,
    }
}

impl<R, K, KF, J, T> Pull for InnerJoin<R, KF, J>
where
    K: Ord,
    KF: Fn(&R) -> K,
    J: FnMut(Vec<R>) -> Result<T>,
{
    type Item = T;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<T>> {
        ctx.checkpoint()?;
        if self.done {
            return Ok(None);
        }
        self.state.prime(ctx)?;
        loop {
            ctx.checkpoint()?;
            // any exhausted input ends the join
            if self.state.heads.iter().any(|h| h.is_none()) {
                self.done = true;
                return Ok(None);
            }
            let max_key = self
                .state
                .heads
                .iter()
                .flatten()
                .map(&self.key_fn)
                .max()
                .ok_or(TimegridError::JoinWithoutInputs)?;

            let mut advanced = false;
            for i in 0..self.state.heads.len() {
                let behind = match &self.state.heads[i] {
                    Some(head) => (self.key_fn)(head) < max_key,
                    None => false,
                };
                if behind {
                    trace!(input = i, "inner join: advancing lagging input");
                    self.state.advance(i, ctx)?;
                    advanced = true;
                }
            }
            if advanced {
                continue;
            }

            // all heads agree on max_key; take the row and refill
            let mut row = Vec::with_capacity(self.state.heads.len());
            for i in 0..self.state.heads.len() {
                let head = self.state.heads[i]
                    .take()
                    .ok_or(TimegridError::JoinWithoutInputs)?;
                row.push(head);
                self.state.advance(i, ctx)?;
            }
            return (self.joiner)(row).map(Some);
        }
    }
}

/// Left join: input 0 is primary, one output per primary element
pub struct LeftJoin<R, KF, J> {
    state: Heads<R>,
    key_fn: KF,
    joiner: J,
    done: bool,
}

/// Join sorted sequences with input 0 as the primary.
///
/// For each primary element, `joiner` receives it plus one `Option<R>` per
/// secondary input, `Some` exactly when that input holds an element with an
/// equal key. Absence is observable and distinct from any present value.
pub fn left_join_n<R, K, KF, J, T>(
    inputs: Vec<BoxPull<R>>,
    key_fn: KF,
    joiner: J,
) -> LeftJoin<R, KF, J>
where
    K: Ord,
    KF: Fn(&R) -> K,
    J: FnMut(R, Vec<Option<R>>) -> Result<T>,
{
    LeftJoin {
        state: Heads::new(inputs),
        key_fn,
        joiner,
        done: false,
    }
}

impl<R, K, KF, J, T> Pull for LeftJoin<R, KF, J>
where
    K: Ord,
    KF: Fn(&R) -> K,
    J: FnMut(R, Vec<Option<R>>) -> Result<T>,
{
    type Item = T;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<T>> {
        ctx.checkpoint()?;
        if self.done {
            return Ok(None);
        }
        self.state.prime(ctx)?;

        // the primary's head drives the join; its slot always refills here
        let Some(primary) = self.state.heads[0].take() else {
            self.done = true;
            return Ok(None);
        };
        self.state.advance(0, ctx)?;
        let primary_key = (self.key_fn)(&primary);

        let mut matches = Vec::with_capacity(self.state.heads.len().saturating_sub(1));
        for i in 1..self.state.heads.len() {
            // discard secondary elements the primary has already passed
            while matches!(
                &self.state.heads[i],
                Some(head) if (self.key_fn)(head) < primary_key
            ) {
                self.state.advance(i, ctx)?;
            }
            let hit = matches!(
                &self.state.heads[i],
                Some(head) if (self.key_fn)(head) == primary_key
            );
            if hit {
                let head = self.state.heads[i].take();
                self.state.advance(i, ctx)?;
                matches.push(head);
            } else {
                matches.push(None);
            }
        }
        (self.joiner)(primary, matches).map(Some)
    }
}

/// Full join: emits one row per key present in any input
pub struct FullJoin<R, KF, J> {
    state: Heads<R>,
    key_fn: KF,
    joiner: J,
    done: bool,
}

/// Join sorted sequences over the union of their keys.
///
/// `joiner` receives one `Option<R>` per input, `Some` for every input
/// holding an element at the row's key.
pub fn full_join_n<R, K, KF, J, T>(
    inputs: Vec<BoxPull<R>>,
    key_fn: KF,
    joiner: J,
) -> FullJoin<R, KF, J>
where
    K: Ord,
    KF: Fn(&R) -> K,
    J: FnMut(Vec<Option<R>>) -> Result<T>,
{
    FullJoin {
        state: Heads::new(inputs),
        key_fn,
        joiner,
        done: false,
    }
}

impl<R, K, KF, J, T> Pull for FullJoin<R, KF, J>
where
    K: Ord,
    KF: Fn(&R) -> K,
    J: FnMut(Vec<Option<R>>) -> Result<T>,
{
    type Item = T;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<T>> {
        ctx.checkpoint()?;
        if self.done {
            return Ok(None);
        }
        self.state.prime(ctx)?;

        let min_key = self
            .state
            .heads
            .iter()
            .flatten()
            .map(&self.key_fn)
            .min();
        let Some(min_key) = min_key else {
            self.done = true;
            return Ok(None);
        };

        let mut row = Vec::with_capacity(self.state.heads.len());
        for i in 0..self.state.heads.len() {
            let hit = matches!(
                &self.state.heads[i],
                Some(head) if (self.key_fn)(head) == min_key
            );
            if hit {
                let head = self.state.heads[i].take();
                self.state.advance(i, ctx)?;
                row.push(head);
            } else {
                row.push(None);
            }
        }
        (self.joiner)(row).map(Some)
    }
}
