//! Core types for the broker ledger.
//!
//! Calendar values, the spreadsheet date codec, identity canonicalisation,
//! record and summary models, the error taxonomy and CLI settings. Nothing in
//! this crate performs I/O except [`settings`].

pub mod calendar;
pub mod canonical;
pub mod date_codec;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use calendar::{CalendarDate, DateRange, WeekStart, YearMonth};
pub use canonical::{
    canonicalize, CanonicalIdentity, CanonicalKey, DuplicateCluster, NameCanonicalizer,
    SharedCanonicalizer,
};
pub use date_codec::DateCodec;
pub use error::{LedgerError, Result, SkipReason, SkippedRecord};
pub use models::{
    DatedRecord, NormalizedRecord, PeriodStats, PeriodSummary, Record, RecordDate, RollingPoint,
    Totals,
};
