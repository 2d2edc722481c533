//! Pure calendar values: days, months and week starts.
//!
//! None of these types carry a time-of-day or a timezone. Two events on the
//! same calendar day are indistinguishable once they are a [`CalendarDate`].

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Years a [`CalendarDate`] may fall in.
///
/// Starting at 1901 keeps every supported serial clear of the spreadsheet
/// 1900 leap-year artifact.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1901..=2099;

// ── CalendarDate ──────────────────────────────────────────────────────────────

/// A validated `(year, month, day)` inside [`SUPPORTED_YEARS`].
///
/// Ordered lexicographically by year, month, day. Construction from an
/// out-of-range component fails; nothing is ever clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Build a date from its components.
    ///
    /// # Examples
    ///
    /// ```
    /// use ledger_core::calendar::CalendarDate;
    ///
    /// assert!(CalendarDate::new(2024, 2, 29).is_ok());
    /// assert!(CalendarDate::new(2023, 2, 29).is_err());
    /// assert!(CalendarDate::new(2024, 13, 1).is_err());
    /// ```
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        if !SUPPORTED_YEARS.contains(&year) {
            return Err(LedgerError::InvalidDate(format!(
                "{:04}-{:02}-{:02}: year outside {}..={}",
                year,
                month,
                day,
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            )));
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(CalendarDate)
            .ok_or_else(|| {
                LedgerError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day))
            })
    }

    /// Wrap a chrono date, enforcing the supported year range.
    pub fn from_naive(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month(), date.day())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// The underlying chrono date.
    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// The month this date belongs to.
    pub fn year_month(&self) -> YearMonth {
        YearMonth {
            year: self.year(),
            month: self.month(),
        }
    }

    /// The Monday on or before this date.
    pub fn week_start(&self) -> WeekStart {
        let back = i64::from(self.0.weekday().num_days_from_monday());
        WeekStart(self.0 - chrono::Duration::days(back))
    }

    /// Signed number of days from `self` to `other`.
    pub fn days_until(&self, other: CalendarDate) -> i64 {
        (other.0 - self.0).num_days()
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl TryFrom<NaiveDate> for CalendarDate {
    type Error = LedgerError;

    fn try_from(date: NaiveDate) -> Result<Self> {
        Self::from_naive(date)
    }
}

impl From<CalendarDate> for NaiveDate {
    fn from(date: CalendarDate) -> Self {
        date.0
    }
}

impl FromStr for CalendarDate {
    type Err = LedgerError;

    /// Strict `YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self> {
        let naive = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| LedgerError::InvalidDate(format!("{:?}", s)))?;
        Self::from_naive(naive)
    }
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// A closed interval of calendar days, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: CalendarDate,
    end: CalendarDate,
}

impl DateRange {
    /// Fails with [`LedgerError::InvalidRange`] when `start > end`.
    pub fn new(start: CalendarDate, end: CalendarDate) -> Result<Self> {
        if start > end {
            return Err(LedgerError::invalid_range(start, end));
        }
        Ok(Self { start, end })
    }

    /// Range bounded only where a bound is given; missing bounds extend to
    /// the edge of [`SUPPORTED_YEARS`].
    pub fn from_bounds(start: Option<CalendarDate>, end: Option<CalendarDate>) -> Result<Self> {
        let start = match start {
            Some(d) => d,
            None => CalendarDate::new(*SUPPORTED_YEARS.start(), 1, 1)?,
        };
        let end = match end {
            Some(d) => d,
            None => CalendarDate::new(*SUPPORTED_YEARS.end(), 12, 31)?,
        };
        Self::new(start, end)
    }

    pub fn start(&self) -> CalendarDate {
        self.start
    }

    pub fn end(&self) -> CalendarDate {
        self.end
    }

    /// Both endpoints inclusive.
    pub fn contains(&self, date: CalendarDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ── YearMonth ─────────────────────────────────────────────────────────────────

/// A `(year, month)` period identifier, ordered by year then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !SUPPORTED_YEARS.contains(&year) || !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidDate(format!(
                "{:04}-{:02}: not a supported month",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Zero-based month count since year 0, used for month arithmetic.
    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Result<Self> {
        let year = ordinal.div_euclid(12);
        let month = ordinal.rem_euclid(12) + 1;
        let year = i32::try_from(year)
            .map_err(|_| LedgerError::InvalidDate(format!("month ordinal {}", ordinal)))?;
        Self::new(year, month as u32)
    }

    /// Number of months from `self` to `other` (`0` when equal, negative when
    /// `other` is earlier).
    pub fn months_until(&self, other: YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
    }

    /// Every month from `self` to `to`, both inclusive. Empty when `to` is
    /// earlier than `self`.
    pub fn iter_to(self, to: YearMonth) -> impl Iterator<Item = YearMonth> {
        let start = self.ordinal();
        let end = to.ordinal();
        // Both bounds are valid months, so every ordinal in between is too.
        (start..=end).filter_map(|o| Self::from_ordinal(o).ok())
    }

    /// First day of the month.
    pub fn first_day(&self) -> CalendarDate {
        CalendarDate(
            NaiveDate::from_ymd_opt(self.year, self.month, 1)
                .unwrap_or(NaiveDate::MIN),
        )
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = LedgerError;

    /// Accepts `YYYY-MM` and the export style `YYYY/MM`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (y, m) = trimmed
            .split_once(|c: char| c == '-' || c == '/')
            .ok_or_else(|| LedgerError::InvalidDate(format!("{:?}", s)))?;
        let year: i32 = y
            .parse()
            .map_err(|_| LedgerError::InvalidDate(format!("{:?}", s)))?;
        let month: u32 = m
            .parse()
            .map_err(|_| LedgerError::InvalidDate(format!("{:?}", s)))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<YearMonth> for String {
    fn from(ym: YearMonth) -> Self {
        ym.to_string()
    }
}

// ── WeekStart ─────────────────────────────────────────────────────────────────

/// The Monday that opens a week.
///
/// Not range-checked: the week holding 1 January 1901 starts in 1900.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekStart(NaiveDate);

impl WeekStart {
    pub fn monday(&self) -> NaiveDate {
        self.0
    }

    /// Export-style label `YYYY/wkNN`.
    ///
    /// Weeks are counted from the Monday on or before 1 January of the
    /// Monday's own year, so a week spanning New Year keeps the old year's
    /// number.
    pub fn label(&self) -> String {
        let year = self.0.year();
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(self.0);
        let back = i64::from(jan1.weekday().num_days_from_monday());
        let first_monday = jan1 - chrono::Duration::days(back);
        let week = (self.0 - first_monday).num_days() / 7 + 1;
        format!("{}/wk{:02}", year, week)
    }
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
