//! Time-of-day handling for scheduled services.
//!
//! Timetables express times relative to the start of a service day. Services
//! running past midnight keep counting upwards ("24:30" is half past midnight
//! on the following calendar day), so a time of day here ranges over two days.

use chrono::Duration;
use std::fmt;

/// Minutes in one calendar day.
pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// Exclusive upper bound on representable minutes (two service days).
const MAX_MINUTES: i32 = 2 * MINUTES_PER_DAY;

/// Error returned when parsing or constructing an invalid time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A time of day within a service day, possibly past midnight.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::TimeOfDay;
///
/// let time = TimeOfDay::parse_hhmm("14:30").unwrap();
/// assert_eq!(time.to_string(), "14:30");
///
/// let late = TimeOfDay::parse_hhmm("24:15").unwrap();
/// assert!(late.is_next_day());
/// assert_eq!(late.to_string(), "00:15");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    /// Midnight at the start of the service day.
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { minutes: 0 };

    /// Create a time from hour (0-47) and minute (0-59).
    pub fn of(hour: u32, minute: u32) -> Result<Self, TimeError> {
        if hour > 47 {
            return Err(TimeError::new("hour must be 0-47"));
        }
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }
        Ok(Self {
            minutes: (hour * 60 + minute) as u16,
        })
    }

    /// Create a time from minutes since the start of the service day.
    ///
    /// Returns `None` when outside the two-day range.
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        if (0..MAX_MINUTES).contains(&minutes) {
            Some(Self {
                minutes: minutes as u16,
            })
        } else {
            None
        }
    }

    /// Parse a time from "HH:MM" or "HH:MM:SS" format.
    ///
    /// Hours up to 47 are accepted for services running past midnight.
    /// Seconds, when present, are validated and then dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::TimeOfDay;
    ///
    /// assert!(TimeOfDay::parse_hhmm("00:00").is_ok());
    /// assert!(TimeOfDay::parse_hhmm("23:59").is_ok());
    /// assert!(TimeOfDay::parse_hhmm("25:10:00").is_ok());
    ///
    /// assert!(TimeOfDay::parse_hhmm("1430").is_err());
    /// assert!(TimeOfDay::parse_hhmm("14:3").is_err());
    /// assert!(TimeOfDay::parse_hhmm("48:00").is_err());
    /// ```
    pub fn parse_hhmm(s: &str) -> Result<Self, TimeError> {
        if s.len() != 5 && s.len() != 8 {
            return Err(TimeError::new("expected HH:MM format"));
        }

        let bytes = s.as_bytes();

        if bytes[2] != b':' {
            return Err(TimeError::new("expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;

        if bytes.len() == 8 {
            if bytes[5] != b':' {
                return Err(TimeError::new("expected colon at position 5"));
            }
            let second = parse_two_digits(&bytes[6..8])
                .ok_or_else(|| TimeError::new("invalid second digits"))?;
            if second > 59 {
                return Err(TimeError::new("second must be 0-59"));
            }
        }

        Self::of(hour, minute)
    }

    /// Returns minutes since the start of the service day.
    pub fn minutes(&self) -> i32 {
        self.minutes as i32
    }

    /// Returns the hour within the service day (0-47).
    pub fn hour(&self) -> u32 {
        self.minutes as u32 / 60
    }

    /// Returns the minute (0-59).
    pub fn minute(&self) -> u32 {
        self.minutes as u32 % 60
    }

    /// Returns the wall-clock hour (0-23).
    pub fn hour_of_day(&self) -> u32 {
        self.hour() % 24
    }

    /// True if this time falls on the calendar day after the service day.
    pub fn is_next_day(&self) -> bool {
        self.minutes() >= MINUTES_PER_DAY
    }

    /// Add a duration, returning `None` if the result leaves the two-day range.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        let mins = i32::try_from(duration.num_minutes()).ok()?;
        Self::from_minutes(self.minutes().checked_add(mins)?)
    }

    /// Subtract a duration, returning `None` if the result would be negative.
    pub fn checked_sub(&self, duration: Duration) -> Option<Self> {
        let mins = i32::try_from(duration.num_minutes()).ok()?;
        Self::from_minutes(self.minutes().checked_sub(mins)?)
    }

    /// Returns the duration between two times.
    ///
    /// Returns a negative duration if `other` is after `self`.
    pub fn signed_duration_since(&self, other: Self) -> Duration {
        Duration::minutes((self.minutes() - other.minutes()) as i64)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse_hhmm(&s)
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> String {
        format!("{:02}:{:02}", time.hour(), time.minute())
    }
}

impl fmt::Debug for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeOfDay({:02}:{:02})", self.hour(), self.minute())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour_of_day(), self.minute())
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn valid_time()(hour in 0u32..48, minute in 0u32..60) -> String {
            format!("{:02}:{:02}", hour, minute)
        }
    }

    proptest! {
        #[test]
        fn valid_hhmm_parses(s in valid_time()) {
            prop_assert!(TimeOfDay::parse_hhmm(&s).is_ok());
        }

        #[test]
        fn string_roundtrip(s in valid_time()) {
            let time = TimeOfDay::parse_hhmm(&s).unwrap();
            prop_assert_eq!(String::from(time), s);
        }

        #[test]
        fn add_sub_identity(mins in 0i32..2880, delta in 0i64..600) {
            let time = TimeOfDay::from_minutes(mins).unwrap();
            if let Some(later) = time.checked_add(Duration::minutes(delta)) {
                prop_assert_eq!(later.checked_sub(Duration::minutes(delta)), Some(time));
                prop_assert_eq!(later.signed_duration_since(time), Duration::minutes(delta));
            }
        }

        #[test]
        fn ordering_matches_minutes(a in 0i32..2880, b in 0i32..2880) {
            let ta = TimeOfDay::from_minutes(a).unwrap();
            let tb = TimeOfDay::from_minutes(b).unwrap();
            prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        }

        #[test]
        fn invalid_minute_rejected(hour in 0u32..48, minute in 60u32..100) {
            let s = format!("{:02}:{:02}", hour, minute);
            prop_assert!(TimeOfDay::parse_hhmm(&s).is_err());
        }
    }
}
