//! Service calendars: on which dates a scheduled service runs.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

/// Compact set of weekdays, one bit per day starting with Monday.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    /// Every day of the week.
    pub const ALL: DaysOfWeek = DaysOfWeek(0b111_1111);

    /// Monday to Friday.
    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(0b001_1111);

    /// Build from the raw bit-set. Bits above the seventh are ignored.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111_1111)
    }

    /// Build from a list of days.
    pub fn from_days(days: &[Weekday]) -> Self {
        days.iter().fold(Self::default(), |acc, day| acc.with(*day))
    }

    /// Returns the raw bit-set.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Returns a copy with `day` added.
    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | (1 << day.num_days_from_monday()))
    }

    /// True if `day` is in the set.
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    /// True if no day is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Calendar validity of a service.
///
/// A service runs on a date if the date is an explicit addition, or if it is
/// not an explicit removal and lies within the date range on one of the
/// operating weekdays.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceCalendar {
    pub days: DaysOfWeek,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub additions: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub removals: BTreeSet<NaiveDate>,
}

impl ServiceCalendar {
    /// Create a calendar without exception dates.
    pub fn new(days: DaysOfWeek, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            days,
            start_date,
            end_date,
            additions: BTreeSet::new(),
            removals: BTreeSet::new(),
        }
    }

    /// Add an exceptional operating date.
    pub fn add_date(mut self, date: NaiveDate) -> Self {
        self.removals.remove(&date);
        self.additions.insert(date);
        self
    }

    /// Add an exceptional non-operating date.
    pub fn remove_date(mut self, date: NaiveDate) -> Self {
        self.additions.remove(&date);
        self.removals.insert(date);
        self
    }

    /// Check if the service runs on a given date.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use transit_planner::domain::{DaysOfWeek, ServiceCalendar};
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    /// let calendar = ServiceCalendar::new(DaysOfWeek::WEEKDAYS, start, end);
    ///
    /// // Friday
    /// assert!(calendar.runs_on(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
    /// // Saturday
    /// assert!(!calendar.runs_on(NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()));
    /// ```
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        if self.additions.contains(&date) {
            return true;
        }
        if self.removals.contains(&date) {
            return false;
        }
        if date < self.start_date || date > self.end_date {
            return false;
        }
        self.days.contains(date.weekday())
    }

    /// True if the service cannot run on any date.
    pub fn never_runs(&self) -> bool {
        self.additions.is_empty() && (self.days.is_empty() || self.start_date > self.end_date)
    }
}
