//! Inclusive calendar-day range filtering.
//!
//! Records are compared by resolved [`CalendarDate`] only, never by raw
//! serial, so a serial and an ISO string naming the same day always land on
//! the same side of a bound.

use ledger_core::calendar::{CalendarDate, DateRange};
use ledger_core::error::{Result, SkippedRecord};
use ledger_core::models::{DatedRecord, NormalizedRecord};
use tracing::debug;

/// Output of one filter pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome<'a, T> {
    /// Records with `start <= date <= end`, in input order.
    pub included: Vec<&'a T>,
    /// Records whose date could not be resolved. `index` is the position in
    /// the filtered slice.
    pub skipped: Vec<SkippedRecord>,
}

pub struct RangeFilter;

impl RangeFilter {
    /// Keep the records dated within `[start, end]`.
    ///
    /// Fails with `InvalidRange` when `start > end`. Undecodable records
    /// never fail the pass; they go to [`FilterOutcome::skipped`].
    pub fn filter<T: DatedRecord>(
        records: &[T],
        start: CalendarDate,
        end: CalendarDate,
    ) -> Result<FilterOutcome<'_, T>> {
        let range = DateRange::new(start, end)?;
        Ok(Self::filter_range(records, &range))
    }

    /// [`RangeFilter::filter`] with an already validated range.
    pub fn filter_range<'a, T: DatedRecord>(
        records: &'a [T],
        range: &DateRange,
    ) -> FilterOutcome<'a, T> {
        let mut included = Vec::new();
        let mut skipped = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match record.resolve_date() {
                Ok(date) if range.contains(date) => included.push(record),
                Ok(_) => {}
                Err(e) => skipped.push(SkippedRecord::from_error(
                    index,
                    record.raw_identity(),
                    &e,
                )),
            }
        }

        debug!(
            "Range {}: {} of {} records included, {} skipped",
            range,
            included.len(),
            records.len(),
            skipped.len()
        );

        FilterOutcome { included, skipped }
    }

    /// Filter records that were already normalised. Nothing can be skipped.
    pub fn filter_normalized<'r>(
        records: &[NormalizedRecord<'r>],
        range: &DateRange,
    ) -> Vec<NormalizedRecord<'r>> {
        records
            .iter()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
