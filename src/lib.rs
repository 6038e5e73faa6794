//! Time-series alignment and joining for sorted sample streams
//!
//! This crate resamples, densifies, differences, and merge-joins ordered
//! streams of timestamped samples. Streams are pulled one element at a time
//! through the [`Pull`] trait, so pipelines hold O(1) state regardless of
//! series length. Timestamps are bucketed by an [`AlignmentPeriod`], either
//! a fixed duration or a calendar unit evaluated in an arbitrary time zone.

pub mod align;
pub mod delta;
pub mod error;
pub mod fill;
pub mod interpolate;
pub mod join;
pub mod period;
pub mod sample;
pub mod stream;

// Re-export commonly used types
pub use error::{Result, TimegridError};

pub use period::{aligned_timestamps, AlignmentPeriod, CalendarUnit, PeriodTimestamps};

pub use sample::{FieldValue, Sample, SeriesValue};

pub use interpolate::{interpolate, interpolate_fields, Interpolate};

pub use stream::{
    drain, from_iter, BoxPull, Chain, Deferred, IterSource, Pull, PullExt, StreamContext,
};

pub use align::reduce::{align_reduce, AvgReducer, BucketReducer, MaxReducer};
pub use align::align;

pub use delta::{align_and_delta, delta, Delta};

pub use fill::{fill_gaps, fill_gaps_forward, fill_gaps_linear, FillMode, GapFiller};

pub use join::{full_join, inner_join, join, left_join, JoinKind, JoinedRow};
