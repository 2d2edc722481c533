//! Main analysis pipeline for the broker ledger.
//!
//! Registers identities, normalises records, applies the optional range
//! filter and computes every period view, returning an [`AnalysisResult`]
//! ready for rendering.

use chrono::{Utc, Weekday};
use ledger_core::calendar::{DateRange, YearMonth};
use ledger_core::canonical::{CanonicalIdentity, DuplicateCluster, NameCanonicalizer};
use ledger_core::error::{LedgerError, Result, SkippedRecord};
use ledger_core::models::{
    check_cost, NormalizedRecord, PeriodSummary, Record, RollingPoint, Totals,
};
use ledger_core::settings::{ValidatedSettings, DEFAULT_WINDOW_DAYS};
use serde::Serialize;
use tracing::info;

use crate::aggregator::{IdentityMonth, PeriodAggregator, WeekPeriod};
use crate::range_filter::RangeFilter;
use crate::reader::Ingested;

// ── Public types ──────────────────────────────────────────────────────────────

/// Bounds of a dense monthly axis.
///
/// A missing bound is taken from the span of the records that survive the
/// range filter, but never past the bound that was given: `from` alone with
/// every record before it yields the single month `from`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenseAxis {
    pub from: Option<YearMonth>,
    pub to: Option<YearMonth>,
}

/// What to compute.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Inclusive day range; `None` keeps every record.
    pub range: Option<DateRange>,
    pub window_days: i64,
    /// `None` skips the dense monthly view.
    pub dense_axis: Option<DenseAxis>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            range: None,
            window_days: DEFAULT_WINDOW_DAYS,
            dense_axis: None,
        }
    }
}

impl From<&ValidatedSettings> for AnalysisRequest {
    fn from(settings: &ValidatedSettings) -> Self {
        Self {
            range: settings.range,
            window_days: settings.window_days,
            dense_axis: Some(DenseAxis {
                from: settings.from_month,
                to: settings.to_month,
            }),
        }
    }
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    pub records_processed: usize,
    /// Records that resolved and fell inside the range.
    pub records_included: usize,
    pub records_skipped: usize,
    /// Ingestion rows that never became records.
    pub rows_rejected: usize,
    /// Distinct canonical keys registered.
    pub identities: usize,
    pub elapsed_seconds: f64,
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub monthly: Vec<PeriodSummary<YearMonth>>,
    /// Present when a dense axis was requested and could be bounded.
    pub monthly_dense: Option<Vec<PeriodSummary<YearMonth>>>,
    pub weekly: Vec<PeriodSummary<WeekPeriod>>,
    pub weekday: Vec<PeriodSummary<Weekday>>,
    pub identities: Vec<PeriodSummary<CanonicalIdentity>>,
    /// Broker activity per month.
    pub identity_monthly: Vec<IdentityMonth>,
    pub rolling: Vec<RollingPoint>,
    pub totals: Totals,
    /// First and last included dates.
    pub span: Option<DateRange>,
    pub duplicate_clusters: Vec<DuplicateCluster>,
    /// Records whose date or cost was unusable, indexed by record position.
    pub skipped: Vec<SkippedRecord>,
    /// Ingestion rejects, indexed by row position.
    pub rejected_rows: Vec<SkippedRecord>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// `true` when any input was left out, at either stage.
    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty() || !self.rejected_rows.is_empty()
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Register every identity with `canonicalizer`, in input order.
/// 2. Resolve dates and check costs into [`NormalizedRecord`]s, collecting
///    skips.
/// 3. Apply the range filter, if any.
/// 4. Compute the period views and totals.
/// 5. Attach duplicate clusters and metadata.
///
/// Parameter errors (a non-positive window, a reversed dense axis) fail the
/// call before any record is touched. Record errors never do.
pub fn analyze(
    records: &[Record],
    request: &AnalysisRequest,
    canonicalizer: &mut NameCanonicalizer,
) -> Result<AnalysisResult> {
    let started = std::time::Instant::now();

    if request.window_days <= 0 {
        return Err(LedgerError::InvalidWindow(request.window_days));
    }
    if let Some(DenseAxis {
        from: Some(from),
        to: Some(to),
    }) = request.dense_axis
    {
        if from > to {
            return Err(LedgerError::InvalidRange {
                start: from.to_string(),
                end: to.to_string(),
            });
        }
    }

    // ── Step 1: Identities ────────────────────────────────────────────────────
    let identities: Vec<CanonicalIdentity> = records
        .iter()
        .map(|r| canonicalizer.register(&r.identity))
        .collect();

    // ── Step 2: Normalise ─────────────────────────────────────────────────────
    let mut normalized: Vec<NormalizedRecord<'_>> = Vec::with_capacity(records.len());
    let mut skipped: Vec<SkippedRecord> = Vec::new();
    for (index, (record, identity)) in records.iter().zip(identities).enumerate() {
        let checked = record
            .date
            .resolve()
            .and_then(|date| record.cost.map(check_cost).transpose().map(|_| date));
        match checked {
            Ok(date) => normalized.push(NormalizedRecord {
                record,
                date,
                identity,
            }),
            Err(e) => skipped.push(SkippedRecord::from_error(index, &record.identity, &e)),
        }
    }

    // ── Step 3: Range filter ──────────────────────────────────────────────────
    let included = match &request.range {
        Some(range) => RangeFilter::filter_normalized(&normalized, range),
        None => normalized,
    };

    // ── Step 4: Period views ──────────────────────────────────────────────────
    let span = PeriodAggregator::span(&included);
    let monthly = PeriodAggregator::monthly(&included).output;
    let monthly_dense = match request.dense_axis.and_then(|axis| dense_bounds(axis, span)) {
        Some((from, to)) => Some(PeriodAggregator::monthly_dense(&included, from, to)?.output),
        None => None,
    };
    let weekly = PeriodAggregator::weekly(&included).output;
    let weekday = PeriodAggregator::by_weekday(&included).output;
    let identities = PeriodAggregator::by_identity(&included).output;
    let identity_monthly = PeriodAggregator::by_identity_monthly(&included).output;
    let rolling = PeriodAggregator::rolling_window(&included, request.window_days)?.output;
    let totals = PeriodAggregator::totals(&included).output;

    // ── Step 5: Result ────────────────────────────────────────────────────────
    let duplicate_clusters = canonicalizer.find_duplicate_clusters();
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        records_processed: records.len(),
        records_included: included.len(),
        records_skipped: skipped.len(),
        rows_rejected: 0,
        identities: canonicalizer.len(),
        elapsed_seconds: started.elapsed().as_secs_f64(),
    };

    info!(
        "Analysed {} records: {} included, {} skipped, {} duplicate clusters",
        metadata.records_processed,
        metadata.records_included,
        metadata.records_skipped,
        duplicate_clusters.len()
    );

    Ok(AnalysisResult {
        monthly,
        monthly_dense,
        weekly,
        weekday,
        identities,
        identity_monthly,
        rolling,
        totals,
        span,
        duplicate_clusters,
        skipped,
        rejected_rows: Vec::new(),
        metadata,
    })
}

/// Close a dense axis against the observed span. `None` when neither the
/// axis nor the span supplies a bound.
fn dense_bounds(axis: DenseAxis, span: Option<DateRange>) -> Option<(YearMonth, YearMonth)> {
    let first = span.map(|s| s.start().year_month());
    let last = span.map(|s| s.end().year_month());
    match (axis.from, axis.to) {
        (Some(from), Some(to)) => Some((from, to)),
        (Some(from), None) => Some((from, last.map_or(from, |end| end.max(from)))),
        (None, Some(to)) => Some((first.map_or(to, |start| start.min(to)), to)),
        (None, None) => first.zip(last),
    }
}

/// [`analyze`] over loaded exports, carrying the ingestion rejects into the
/// result.
pub fn analyze_ingested(
    ingested: &Ingested,
    request: &AnalysisRequest,
    canonicalizer: &mut NameCanonicalizer,
) -> Result<AnalysisResult> {
    let mut result = analyze(&ingested.records, request, canonicalizer)?;
    result.rejected_rows = ingested.rejected.clone();
    result.metadata.rows_rejected = ingested.rejected.len();
    Ok(result)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
