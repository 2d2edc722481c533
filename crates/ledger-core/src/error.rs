use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::CalendarDate;

/// All errors produced by the broker ledger crates.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A spreadsheet serial was negative, non-finite, or outside the
    /// supported year range.
    #[error("Invalid date serial: {0}")]
    InvalidSerial(String),

    /// Year/month/day components, or a date string, did not form a valid
    /// calendar date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A closed range was given with its start after its end.
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    /// A rolling window size was zero or negative.
    #[error("Invalid window size: {0} (must be a positive number of days)")]
    InvalidWindow(i64),

    /// A cost cell was negative or not a number.
    #[error("Invalid cost: {0}")]
    InvalidCost(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The given data path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No `.json` / `.jsonl` export files were found under the given directory.
    #[error("No export files found in {0}")]
    NoDataFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    /// Build an [`LedgerError::InvalidRange`] from two dates.
    pub fn invalid_range(start: CalendarDate, end: CalendarDate) -> Self {
        LedgerError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    /// The per-record skip reason this error maps to, if it is a record-level
    /// failure. Parameter errors return `None`.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            LedgerError::InvalidSerial(_) => Some(SkipReason::InvalidSerial),
            LedgerError::InvalidDate(_) => Some(SkipReason::InvalidDate),
            LedgerError::InvalidCost(_) => Some(SkipReason::InvalidCost),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the ledger crates.
pub type Result<T> = std::result::Result<T, LedgerError>;

// ── Skip report ───────────────────────────────────────────────────────────────

/// Why a single record was left out of a filter or aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    InvalidSerial,
    InvalidDate,
    InvalidCost,
    MalformedRow,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::InvalidSerial => "InvalidSerial",
            SkipReason::InvalidDate => "InvalidDate",
            SkipReason::InvalidCost => "InvalidCost",
            SkipReason::MalformedRow => "MalformedRow",
        };
        f.write_str(s)
    }
}

/// One entry of a skip report.
///
/// `index` is the record's position in the sequence handed to the pass that
/// skipped it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub identity: String,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedRecord {
    /// Build a skip entry from a record-level error.
    ///
    /// Errors that are not record-level are reported as `MalformedRow`.
    pub fn from_error(index: usize, identity: impl Into<String>, err: &LedgerError) -> Self {
        Self {
            index,
            identity: identity.into(),
            reason: err.skip_reason().unwrap_or(SkipReason::MalformedRow),
            detail: err.to_string(),
        }
    }
}
