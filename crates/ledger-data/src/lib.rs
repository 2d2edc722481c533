//! Data layer for the broker ledger.
//!
//! Responsible for loading export rows into records, filtering them by
//! calendar range, bucketing them into periods and running the top-level
//! analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod range_filter;
pub mod reader;

pub use ledger_core as core;
