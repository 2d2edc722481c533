//! Spreadsheet date serials and ISO date text.
//!
//! There is exactly one epoch anchor in this crate, [`EPOCH_DAYS_FROM_CE`].
//! Every conversion between a serial and a [`CalendarDate`] goes through
//! [`DateCodec`].

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::calendar::CalendarDate;
use crate::error::{LedgerError, Result};

/// Serial `0` is 1899-12-30 (so serial `1` is 1899-12-31), expressed as a
/// chrono day number counted from 0001-01-01 = 1.
///
/// For every serial in the supported range this matches what spreadsheet
/// applications display.
pub const EPOCH_DAYS_FROM_CE: i32 = 693_594;

/// `YYYY-MM-DD`, optionally followed by a time-of-day that is discarded.
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})(?:[T ].*)?$").expect("regex is valid")
});

/// Converts between spreadsheet serials and calendar dates.
pub struct DateCodec;

impl DateCodec {
    /// Decode a serial into the calendar day it names.
    ///
    /// Any fractional (time-of-day) part is floored away before decoding, so
    /// `45000.999` is the same day as `45000`.
    ///
    /// Fails with [`LedgerError::InvalidSerial`] for negative or non-finite
    /// input, and for serials whose day falls outside the supported years.
    ///
    /// # Examples
    ///
    /// ```
    /// use ledger_core::date_codec::DateCodec;
    ///
    /// let d = DateCodec::decode(45000.75).unwrap();
    /// assert_eq!(d.to_string(), "2023-03-15");
    /// assert!(DateCodec::decode(-1.0).is_err());
    /// ```
    pub fn decode(serial: f64) -> Result<CalendarDate> {
        if !serial.is_finite() || serial < 0.0 {
            return Err(LedgerError::InvalidSerial(serial.to_string()));
        }

        let whole = serial.floor();
        // Anything this large is centuries past the supported range.
        if whole > f64::from(i32::MAX - EPOCH_DAYS_FROM_CE) {
            return Err(LedgerError::InvalidSerial(serial.to_string()));
        }

        let days = EPOCH_DAYS_FROM_CE + whole as i32;
        let naive = NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or_else(|| LedgerError::InvalidSerial(serial.to_string()))?;

        CalendarDate::from_naive(naive).map_err(|_| {
            LedgerError::InvalidSerial(format!(
                "{} ({} is outside the supported years)",
                serial,
                naive.format("%Y-%m-%d")
            ))
        })
    }

    /// Encode a calendar date as its integer serial.
    ///
    /// `DateCodec::decode(DateCodec::encode(d) as f64) == Ok(d)` for every
    /// valid `d`.
    pub fn encode(date: CalendarDate) -> i64 {
        i64::from(date.naive().num_days_from_ce() - EPOCH_DAYS_FROM_CE)
    }

    /// Parse ISO date text (`YYYY-MM-DD`, optionally with a trailing
    /// `T…`/` …` time-of-day that is ignored).
    ///
    /// Fails with [`LedgerError::InvalidDate`] for anything else.
    pub fn parse_text(text: &str) -> Result<CalendarDate> {
        let trimmed = text.trim();
        let caps = ISO_DATE
            .captures(trimmed)
            .ok_or_else(|| LedgerError::InvalidDate(format!("{:?}", text)))?;

        let field = |i: usize| {
            caps[i]
                .parse::<u32>()
                .map_err(|_| LedgerError::InvalidDate(format!("{:?}", text)))
        };
        let year = field(1)? as i32;
        let month = field(2)?;
        let day = field(3)?;

        CalendarDate::new(year, month, day)
    }
}
