//! Joining aligned sample streams by timestamp
//!
//! [`join`] merges any number of sorted, strictly-increasing sample streams
//! into a stream of [`JoinedRow`]s keyed by timestamp. Every row carries one
//! value slot per input, in input order; an absent slot is `None`, which is
//! observable and distinct from any present value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimegridError;
use crate::sample::Sample;
use crate::stream::join::{full_join_n, inner_join_n, left_join_n};
use crate::stream::{BoxPull, PullExt};

/// Which timestamps appear in the joined output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Timestamps present in every input
    Inner,
    /// Timestamps of input 0; other inputs contribute when they match
    Left,
    /// Timestamps present in any input
    Full,
}

/// One joined record: a timestamp plus one optional value per input, in
/// input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow<V> {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Option<V>>,
}

impl<V> JoinedRow<V> {
    pub fn new(timestamp: DateTime<Utc>, values: Vec<Option<V>>) -> Self {
        Self { timestamp, values }
    }
}

/// Merge-join sorted sample streams on their timestamps.
///
/// Inputs must be sorted ascending with strictly increasing timestamps.
/// Output rows are sorted and strictly increasing as well. Pulling from a
/// join with zero inputs fails with [`TimegridError::JoinWithoutInputs`].
pub fn join<V>(streams: Vec<BoxPull<Sample<V>>>, kind: JoinKind) -> BoxPull<JoinedRow<V>>
where
    V: Clone + 'static,
{
    let key = |sample: &Sample<V>| sample.timestamp;
    match kind {
        JoinKind::Inner => inner_join_n(streams, key, |row: Vec<Sample<V>>| {
            let timestamp = row[0].timestamp;
            let values = row.into_iter().map(|s| Some(s.value)).collect();
            Ok(JoinedRow::new(timestamp, values))
        })
        .boxed(),
        JoinKind::Left => left_join_n(
            streams,
            key,
            |primary: Sample<V>, rest: Vec<Option<Sample<V>>>| {
                let timestamp = primary.timestamp;
                let values = std::iter::once(Some(primary.value))
                    .chain(rest.into_iter().map(|s| s.map(|s| s.value)))
                    .collect();
                Ok(JoinedRow::new(timestamp, values))
            },
        )
        .boxed(),
        JoinKind::Full => full_join_n(streams, key, |row: Vec<Option<Sample<V>>>| {
            let timestamp = row
                .iter()
                .flatten()
                .next()
                .ok_or(TimegridError::JoinWithoutInputs)?
                .timestamp;
            let values = row.into_iter().map(|s| s.map(|s| s.value)).collect();
            Ok(JoinedRow::new(timestamp, values))
        })
        .boxed(),
    }
}

/// [`join`] with [`JoinKind::Inner`]
pub fn inner_join<V: Clone + 'static>(streams: Vec<BoxPull<Sample<V>>>) -> BoxPull<JoinedRow<V>> {
    join(streams, JoinKind::Inner)
}

/// [`join`] with [`JoinKind::Left`]
pub fn left_join<V: Clone + 'static>(streams: Vec<BoxPull<Sample<V>>>) -> BoxPull<JoinedRow<V>> {
    join(streams, JoinKind::Left)
}

/// [`join`] with [`JoinKind::Full`]
pub fn full_join<V: Clone + 'static>(streams: Vec<BoxPull<Sample<V>>>) -> BoxPull<JoinedRow<V>> {
    join(streams, JoinKind::Full)
}
