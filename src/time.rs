//! Timestamp handling: epoch milliseconds to `start_time`, and the calendar
//! decomposition behind the time table.
//!
//! `start_time` is a timezone-naive wall-clock value read in UTC. Its string
//! form is `YYYY-MM-DD HH:MM:SS`, followed by `.ffffff` only when the
//! sub-second part is non-zero (`2018-11-01 21:01:46.796000`).

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Weekday};

use crate::common::TimeRow;

const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const START_TIME_FRACTIONAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const START_TIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// ============================================================================
// Weekday numbering
// ============================================================================

/// How the `weekday` column numbers the days of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekdayNumbering {
    /// Sunday = 1, Monday = 2, ..., Saturday = 7.
    SundayOne,
    /// Monday = 0, Tuesday = 1, ..., Sunday = 6.
    MondayZero,
}

impl WeekdayNumbering {
    pub fn number(self, weekday: Weekday) -> i32 {
        match self {
            WeekdayNumbering::SundayOne => weekday.number_from_sunday() as i32,
            WeekdayNumbering::MondayZero => weekday.num_days_from_monday() as i32,
        }
    }
}

/// The convention used for every `weekday` value this crate writes.
pub const WEEKDAY_NUMBERING: WeekdayNumbering = WeekdayNumbering::SundayOne;

// ============================================================================
// StartTime
// ============================================================================

/// A play timestamp, carried both as the parsed value and its canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StartTime {
    pub at: NaiveDateTime,
    pub text: String,
}

impl StartTime {
    /// Convert epoch milliseconds. Returns `None` outside chrono's range.
    pub fn from_millis(ms: i64) -> Option<Self> {
        let at = DateTime::from_timestamp_millis(ms)?.naive_utc();
        Some(Self::from_naive(at))
    }

    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self {
            text: format_start_time(&at),
            at,
        }
    }

    /// Parse the canonical text form back into a `StartTime`.
    pub fn parse(text: &str) -> Option<Self> {
        let at = NaiveDateTime::parse_from_str(text, START_TIME_PARSE_FORMAT).ok()?;
        Some(Self {
            at,
            text: text.to_string(),
        })
    }

    pub fn year(&self) -> i32 {
        self.at.year()
    }

    pub fn month(&self) -> i32 {
        self.at.month() as i32
    }

    /// Decompose into a time-table row.
    pub fn to_time_row(&self) -> TimeRow {
        TimeRow {
            start_time: self.text.clone(),
            hour: self.at.hour() as i32,
            day: self.at.day() as i32,
            week: self.at.iso_week().week() as i32,
            month: self.month(),
            year: self.year(),
            weekday: WEEKDAY_NUMBERING.number(self.at.weekday()),
        }
    }
}

pub fn format_start_time(at: &NaiveDateTime) -> String {
    if at.nanosecond() == 0 {
        at.format(START_TIME_FORMAT).to_string()
    } else {
        at.format(START_TIME_FRACTIONAL_FORMAT).to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
