//! Alignment periods and the aligned timestamp generator
//!
//! An [`AlignmentPeriod`] maps any instant to the start and end of the
//! enclosing period. Two families exist:
//!
//! - **Fixed**: constant-duration periods anchored at 1970-01-01T00:00
//!   *local to the period's zone*
//! - **Calendar**: day/week/month/quarter/half-year/year boundaries in the
//!   period's zone, so periods have variable length and follow DST
//!
//! Contract, for every instant `t`:
//!
//! ```text
//! start(t) <= t < end(t)
//! start(start(t)) == start(t)        (idempotent)
//! start(end(t)) == end(t)            (periods tile without gap or overlap)
//! ```
//!
//! Weeks start on Monday.

use chrono::{DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::stream::{Pull, StreamContext};

/// Calendar unit for calendar-based periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarUnit {
    Day,
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PeriodKind {
    Fixed(Duration),
    Calendar(CalendarUnit),
}

/// A tiling of the timeline into periods, fixed-duration or calendar-based,
/// in a given time zone.
#[derive(Debug, Clone)]
pub struct AlignmentPeriod<Tz: TimeZone> {
    kind: PeriodKind,
    zone: Tz,
}

impl<Tz: TimeZone> AlignmentPeriod<Tz> {
    /// Create a fixed-duration period anchored at the zone-local epoch.
    ///
    /// Periods are microsecond-granular.
    ///
    /// # Panics
    /// Panics when `duration` is shorter than one microsecond; an invalid
    /// duration is a programmer error, not a runtime condition.
    pub fn fixed(duration: Duration, zone: Tz) -> Self {
        assert!(
            duration >= Duration::microseconds(1),
            "Period duration must be at least one microsecond"
        );
        Self {
            kind: PeriodKind::Fixed(duration),
            zone,
        }
    }

    /// Create a calendar-based period in the given zone
    pub fn calendar(unit: CalendarUnit, zone: Tz) -> Self {
        Self {
            kind: PeriodKind::Calendar(unit),
            zone,
        }
    }

    /// The zone this period tiles the timeline in
    pub fn zone(&self) -> &Tz {
        &self.zone
    }

    /// Start of the period enclosing `t`
    pub fn start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        match self.kind {
            PeriodKind::Fixed(duration) => {
                let epoch = self.local_epoch();
                let elapsed = t - epoch;
                let aligned = if let (Some(elapsed_us), Some(size_us)) =
                    (elapsed.num_microseconds(), duration.num_microseconds())
                {
                    Duration::microseconds(elapsed_us.div_euclid(size_us) * size_us)
                } else {
                    // only durations beyond i64 microseconds land here; their
                    // millisecond count cannot be zero
                    let size_ms = duration.num_milliseconds().max(1);
                    let elapsed_ms = elapsed.num_milliseconds();
                    Duration::milliseconds(elapsed_ms.div_euclid(size_ms) * size_ms)
                };
                epoch + aligned
            }
            PeriodKind::Calendar(unit) => {
                let local = t.with_timezone(&self.zone);
                let date = local.date_naive();
                let anchor = truncate_date(date, unit);
                self.resolve_local_midnight(anchor)
            }
        }
    }

    /// End of the period enclosing `t`, i.e. the start of the next period
    pub fn end(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.start(t);
        match self.kind {
            PeriodKind::Fixed(duration) => start + duration,
            PeriodKind::Calendar(unit) => {
                let date = start.with_timezone(&self.zone).date_naive();
                let next = advance_date(date, unit);
                self.resolve_local_midnight(next)
            }
        }
    }

    /// 1970-01-01T00:00 in this period's zone, as a UTC instant
    fn local_epoch(&self) -> DateTime<Utc> {
        match self.zone.with_ymd_and_hms(1970, 1, 1, 0, 0, 0) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => {
                // A zone whose epoch midnight falls in a DST gap shifts the
                // anchor to the first valid local time after it.
                self.resolve_gap(
                    NaiveDate::from_ymd_opt(1970, 1, 1)
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .unwrap_or_default(),
                )
            }
        }
    }

    /// Resolve local midnight of `date` to a UTC instant, biasing DST
    /// ambiguity to the earliest valid mapping.
    fn resolve_local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = match date.and_hms_opt(0, 0, 0) {
            Some(n) => n,
            None => date.and_time(chrono::NaiveTime::MIN),
        };
        match self.zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => self.resolve_gap(naive),
        }
    }

    /// A local time skipped by a DST transition maps to the first valid
    /// local time after the gap. DST jumps are at most a few hours, so a
    /// bounded forward scan in hour steps always terminates.
    fn resolve_gap(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        let mut candidate = naive;
        for _ in 0..4 {
            candidate += Duration::hours(1);
            if let Some(dt) = self.zone.from_local_datetime(&candidate).earliest() {
                return dt.with_timezone(&Utc);
            }
        }
        // No real zone skips more than a few hours; fall back to reading the
        // naive time as UTC rather than looping forever.
        Utc.from_utc_datetime(&naive)
    }
}

fn truncate_date(date: NaiveDate, unit: CalendarUnit) -> NaiveDate {
    match unit {
        CalendarUnit::Day => date,
        CalendarUnit::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        CalendarUnit::Month => first_of_month(date.year(), date.month()),
        CalendarUnit::Quarter => first_of_month(date.year(), (date.month0() / 3) * 3 + 1),
        CalendarUnit::HalfYear => first_of_month(date.year(), if date.month() <= 6 { 1 } else { 7 }),
        CalendarUnit::Year => first_of_month(date.year(), 1),
    }
}

fn advance_date(start: NaiveDate, unit: CalendarUnit) -> NaiveDate {
    match unit {
        CalendarUnit::Day => start + Duration::days(1),
        CalendarUnit::Week => start + Duration::days(7),
        CalendarUnit::Month => start + Months::new(1),
        CalendarUnit::Quarter => start + Months::new(3),
        CalendarUnit::HalfYear => start + Months::new(6),
        CalendarUnit::Year => start + Months::new(12),
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Day 1 of a valid month always exists
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| panic!("invalid calendar month {year}-{month}"))
}

impl<Tz: TimeZone> fmt::Display for AlignmentPeriod<Tz> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PeriodKind::Fixed(d) => write!(f, "fixed[{}s]", d.num_seconds()),
            PeriodKind::Calendar(unit) => write!(f, "calendar[{unit:?}]"),
        }
    }
}

/// Lazily enumerates period-start instants over `[from, to)`.
///
/// The first element is `period.start(from)`, each subsequent element the
/// end of the previous one, stopping strictly before `to`. Empty when
/// `from >= to`.
#[derive(Debug)]
pub struct PeriodTimestamps<Tz: TimeZone> {
    period: AlignmentPeriod<Tz>,
    cursor: Option<DateTime<Utc>>,
    to: DateTime<Utc>,
}

/// Create the aligned timestamp generator for `[from, to)`
pub fn aligned_timestamps<Tz: TimeZone>(
    period: AlignmentPeriod<Tz>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> PeriodTimestamps<Tz> {
    let cursor = if from >= to {
        None
    } else {
        Some(period.start(from))
    };
    PeriodTimestamps { period, cursor, to }
}

impl<Tz: TimeZone> Pull for PeriodTimestamps<Tz> {
    type Item = DateTime<Utc>;

    fn pull(&mut self, ctx: &StreamContext) -> Result<Option<DateTime<Utc>>> {
        ctx.checkpoint()?;
        let Some(current) = self.cursor else {
            return Ok(None);
        };
        if current >= self.to {
            self.cursor = None;
            return Ok(None);
        }
        self.cursor = Some(self.period.end(current));
        Ok(Some(current))
    }
}
