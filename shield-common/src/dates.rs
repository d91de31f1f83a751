//! Submission date handling
//!
//! Telemetry submission dates travel as `YYYYMMDD` strings. Lexicographic
//! order over that form is chronological order, which the tree builder relies
//! on when picking the latest date of a batch.

use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wire format of a submission date
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Compares lower than every real submission date
pub const LATEST_SENTINEL: &str = "00000000";

/// A calendar day in `YYYYMMDD` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionDate(NaiveDate);

impl SubmissionDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// Subtract whole days, saturating at the earliest representable date
    pub fn days_before(&self, days: u32) -> Self {
        Self(
            self.0
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
        )
    }
}

impl FromStr for SubmissionDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "submission date must be YYYYMMDD, got '{}'",
                s
            )));
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("invalid submission date '{}': {}", s, e)))
    }
}

impl fmt::Display for SubmissionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl Serialize for SubmissionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SubmissionDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of submission dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: SubmissionDate,
    pub end: SubmissionDate,
}

impl DateRange {
    /// Resolve the query window for a run
    ///
    /// Without explicit bounds the window ends yesterday and starts
    /// `lookback_days` before that. Either bound may be overridden on its own.
    pub fn resolve(
        today: NaiveDate,
        lookback_days: u32,
        start: Option<SubmissionDate>,
        end: Option<SubmissionDate>,
    ) -> Result<Self> {
        let today = SubmissionDate::new(today);
        let start = start.unwrap_or_else(|| today.days_before(lookback_days.saturating_add(1)));
        let end = end.unwrap_or_else(|| today.days_before(1));

        if start > end {
            return Err(Error::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether a raw `YYYYMMDD` string falls inside the range
    ///
    /// Strings that do not parse as dates are never contained.
    pub fn contains(&self, raw: &str) -> bool {
        match raw.parse::<SubmissionDate>() {
            Ok(date) => self.start <= date && date <= self.end,
            Err(_) => false,
        }
    }

    /// Number of days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end.as_naive() - self.start.as_naive()).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
