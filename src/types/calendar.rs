//! Calendar types used to partition the cache and to walk a date range month by month.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A calendar month, `Month(year, month)` with `month` in `1..=12`.
///
/// This is the unit of cache partitioning: every partition file holds the rows of exactly one
/// `Month` for one source and key.
///
/// # Examples
///
/// ```
/// use radiation_sync::Month;
///
/// let july = Month::new(2024, 7).unwrap();
/// assert_eq!(july.to_string(), "2024-07");
/// assert_eq!(july.next(), Month::new(2024, 8).unwrap());
/// assert_eq!(Month::new(2024, 12).unwrap().next(), Month::new(2025, 1).unwrap());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct Month(i32, u32);

impl Month {
    /// Returns `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self(year, month))
    }

    /// The month a date (or datetime) falls in.
    pub fn of(date: impl Datelike) -> Self {
        Self(date.year(), date.month())
    }

    pub fn year(self) -> i32 {
        self.0
    }

    pub fn month(self) -> u32 {
        self.1
    }

    pub fn next(self) -> Self {
        if self.1 == 12 {
            Self(self.0 + 1, 1)
        } else {
            Self(self.0, self.1 + 1)
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, self.1, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, self.1, days_in_month(self.0, self.1)?)
    }

    /// The whole month as an inclusive date range.
    pub fn date_range(self) -> Option<DateRange> {
        DateRange::new(self.first_day()?, self.last_day()?)
    }

    /// File name of this month's partition inside its year directory, e.g. `07.csv`.
    pub(crate) fn file_name(self) -> String {
        format!("{:02}.csv", self.1)
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0, self.1)
    }
}

/// An inclusive range of calendar dates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Returns `None` if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn contains_datetime(&self, datetime: NaiveDateTime) -> bool {
        self.contains(datetime.date())
    }

    /// Every calendar month that intersects the range, in order.
    pub fn months(&self) -> impl Iterator<Item = Month> {
        let last = Month::of(self.end);
        std::iter::successors(Some(Month::of(self.start)), move |m| {
            let next = m.next();
            (next <= last).then_some(next)
        })
    }

    /// The part of this range that falls inside `month`, if any.
    pub fn clip_to(&self, month: Month) -> Option<DateRange> {
        let whole = month.date_range()?;
        DateRange::new(self.start.max(whole.start), self.end.min(whole.end))
    }

    pub fn intersects(&self, month: Month) -> bool {
        self.clip_to(month).is_some()
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Option<u32> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_month_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_day_of_next_month = NaiveDate::from_ymd_opt(next_month_year, next_month, 1)?;
    let last_day_of_current_month = first_day_of_next_month - Duration::days(1);
    Some(last_day_of_current_month.day())
}
