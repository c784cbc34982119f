//! Quiet-hours schedule and its polling predicate.
//!
//! # Invariants
//! - Times are strict `HH:MM` (two digits each, 24-hour clock).
//! - Days are `0 = Sunday` .. `6 = Saturday`.
//! - `end < start` wraps past midnight; `start == end` is an empty window.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Invalid quiet-hours input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuietHoursError {
    InvalidTime(String),
    InvalidDay(u8),
}

impl Display for QuietHoursError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTime(value) => write!(f, "invalid time `{value}`; expected HH:MM"),
            Self::InvalidDay(day) => write!(f, "invalid day of week {day}; expected 0-6"),
        }
    }
}

impl Error for QuietHoursError {}

/// Wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, QuietHoursError> {
        if hour > 23 || minute > 59 {
            return Err(QuietHoursError::InvalidTime(format!("{hour}:{minute}")));
        }
        Ok(Self { hour, minute })
    }

    /// Parses strict `HH:MM`.
    pub fn parse(value: &str) -> Result<Self, QuietHoursError> {
        let invalid = || QuietHoursError::InvalidTime(value.to_string());
        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let hour = (digits[0] - b'0') * 10 + (digits[1] - b'0');
        let minute = (digits[2] - b'0') * 10 + (digits[3] - b'0');
        Self::new(hour, minute).map_err(|_| invalid())
    }

    pub fn minutes_since_midnight(self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl Display for ClockTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = QuietHoursError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Recurring weekly window during which the garden is "resting".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHoursSchedule {
    pub enabled: bool,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub days_of_week: Vec<u8>,
}

impl QuietHoursSchedule {
    pub fn validate(&self) -> Result<(), QuietHoursError> {
        match self.days_of_week.iter().find(|day| **day > 6) {
            Some(day) => Err(QuietHoursError::InvalidDay(*day)),
            None => Ok(()),
        }
    }
}

/// Whether `now` falls inside the schedule's window.
///
/// The day check uses `now`'s own weekday, including the post-midnight
/// part of a wrapping window.
pub fn is_quiet_time<Tz: TimeZone>(schedule: &QuietHoursSchedule, now: &DateTime<Tz>) -> bool {
    if !schedule.enabled {
        return false;
    }
    let today = now.weekday().num_days_from_sunday();
    if !schedule
        .days_of_week
        .iter()
        .any(|day| u32::from(*day) == today)
    {
        return false;
    }

    let minute = now.hour() * 60 + now.minute();
    let start = schedule.start_time.minutes_since_midnight();
    let end = schedule.end_time.minutes_since_midnight();
    if start <= end {
        start <= minute && minute < end
    } else {
        minute >= start || minute < end
    }
}
