//! Period aggregation: monthly, weekly, weekday, per-identity and rolling.
//!
//! Every operation resolves dates itself and reports records it could not
//! place, so a summary is always accompanied by its skip report.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Weekday;
use ledger_core::calendar::{CalendarDate, DateRange, WeekStart, YearMonth};
use ledger_core::canonical::{CanonicalIdentity, CanonicalKey};
use ledger_core::date_codec::DateCodec;
use ledger_core::error::{LedgerError, Result, SkippedRecord};
use ledger_core::models::{
    avg_cost, check_cost, DatedRecord, NormalizedRecord, PeriodStats, PeriodSummary,
    RollingPoint, Totals,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Output types ──────────────────────────────────────────────────────────────

/// An aggregation result together with the records it had to leave out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregated<T> {
    pub output: T,
    /// `index` is the position in the aggregated slice.
    pub skipped: Vec<SkippedRecord>,
}

/// A week key: the opening Monday plus its `YYYY/wkNN` label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekPeriod {
    pub start: WeekStart,
    pub label: String,
}

impl From<WeekStart> for WeekPeriod {
    fn from(start: WeekStart) -> Self {
        Self {
            label: start.label(),
            start,
        }
    }
}

/// Per-identity summaries for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMonth {
    pub month: YearMonth,
    /// Identities active that month, by count descending then display name.
    pub identities: Vec<PeriodSummary<CanonicalIdentity>>,
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

// ── PeriodAggregator ──────────────────────────────────────────────────────────

/// Stateless helper that groups records by calendar period.
pub struct PeriodAggregator;

impl PeriodAggregator {
    /// Monthly summaries, ascending. Only months with at least one record
    /// appear.
    pub fn monthly<T: DatedRecord>(records: &[T]) -> Aggregated<Vec<PeriodSummary<YearMonth>>> {
        Self::bucket(records, |date| date.year_month())
    }

    /// One summary per month in `[from, to]`, empty months included with a
    /// zero count.
    ///
    /// Records dated outside the axis are left out of the output. They are
    /// not skips.
    pub fn monthly_dense<T: DatedRecord>(
        records: &[T],
        from: YearMonth,
        to: YearMonth,
    ) -> Result<Aggregated<Vec<PeriodSummary<YearMonth>>>> {
        if from > to {
            return Err(LedgerError::InvalidRange {
                start: from.to_string(),
                end: to.to_string(),
            });
        }

        let sparse = Self::monthly(records);
        let mut by_month: BTreeMap<YearMonth, PeriodSummary<YearMonth>> = sparse
            .output
            .into_iter()
            .map(|s| (s.period, s))
            .collect();

        let output = from
            .iter_to(to)
            .map(|month| {
                by_month
                    .remove(&month)
                    .unwrap_or_else(|| PeriodSummary::empty(month))
            })
            .collect();

        Ok(Aggregated {
            output,
            skipped: sparse.skipped,
        })
    }

    /// Weekly summaries keyed by the Monday that opens each week, ascending
    /// and sparse.
    pub fn weekly<T: DatedRecord>(records: &[T]) -> Aggregated<Vec<PeriodSummary<WeekPeriod>>> {
        let by_start = Self::bucket(records, |date| date.week_start());
        Aggregated {
            output: by_start
                .output
                .into_iter()
                .map(|s| PeriodSummary {
                    period: WeekPeriod::from(s.period),
                    count: s.count,
                    cost_sum: s.cost_sum,
                    avg_cost: s.avg_cost,
                })
                .collect(),
            skipped: by_start.skipped,
        }
    }

    /// Exactly seven summaries, Monday first, zero-filled.
    pub fn by_weekday<T: DatedRecord>(records: &[T]) -> Aggregated<Vec<PeriodSummary<Weekday>>> {
        let (resolved, mut skipped) = resolve_all(records);
        let mut stats = [PeriodStats::default(); 7];
        for entry in &resolved {
            let slot = &mut stats[entry.date.weekday().num_days_from_monday() as usize];
            tally(slot, entry, records, &mut skipped);
        }
        Aggregated {
            output: WEEKDAYS
                .iter()
                .zip(stats)
                .map(|(day, s)| s.into_summary(*day))
                .collect(),
            skipped,
        }
    }

    /// Summaries per canonical identity, by count descending then display
    /// name ascending.
    ///
    /// Identities merged by an alias share one summary. The display name is
    /// the one resolved for the first record of each key.
    pub fn by_identity(
        records: &[NormalizedRecord<'_>],
    ) -> Aggregated<Vec<PeriodSummary<CanonicalIdentity>>> {
        let (resolved, mut skipped) = resolve_all(records);
        let mut map: BTreeMap<CanonicalKey, (String, PeriodStats)> = BTreeMap::new();
        for entry in &resolved {
            let identity = &records[entry.index].identity;
            let slot = map
                .entry(identity.key.clone())
                .or_insert_with(|| (identity.display_name.clone(), PeriodStats::default()));
            tally(&mut slot.1, entry, records, &mut skipped);
        }

        Aggregated {
            output: identity_summaries(map),
            skipped,
        }
    }

    /// Per-identity summaries for each month, ascending by month.
    ///
    /// Only months with records appear, and within a month only the
    /// identities active in it. Display names follow [`Self::by_identity`].
    pub fn by_identity_monthly(
        records: &[NormalizedRecord<'_>],
    ) -> Aggregated<Vec<IdentityMonth>> {
        let (resolved, mut skipped) = resolve_all(records);
        let mut names: BTreeMap<CanonicalKey, String> = BTreeMap::new();
        let mut months: BTreeMap<YearMonth, BTreeMap<CanonicalKey, PeriodStats>> =
            BTreeMap::new();
        for entry in &resolved {
            let identity = &records[entry.index].identity;
            names
                .entry(identity.key.clone())
                .or_insert_with(|| identity.display_name.clone());
            let slot = months
                .entry(entry.date.year_month())
                .or_default()
                .entry(identity.key.clone())
                .or_default();
            tally(slot, entry, records, &mut skipped);
        }

        let output = months
            .into_iter()
            .map(|(month, per_key)| {
                let named = per_key
                    .into_iter()
                    .map(|(key, stats)| {
                        let display_name = names.get(&key).cloned().unwrap_or_default();
                        (key, (display_name, stats))
                    })
                    .collect();
                IdentityMonth {
                    month,
                    identities: identity_summaries(named),
                }
            })
            .collect();

        Aggregated { output, skipped }
    }

    /// Trailing `window_days` series over every calendar day from the first
    /// to the last observed date.
    ///
    /// Each point covers `[day - window_days + 1, day]`. Days with no records
    /// of their own still appear. Fails with `InvalidWindow` when
    /// `window_days` is not positive.
    pub fn rolling_window<T: DatedRecord>(
        records: &[T],
        window_days: i64,
    ) -> Result<Aggregated<Vec<RollingPoint>>> {
        if window_days <= 0 {
            return Err(LedgerError::InvalidWindow(window_days));
        }

        let (resolved, mut skipped) = resolve_all(records);

        // Keyed by serial so the sweep never builds an out-of-range date.
        let mut per_day: BTreeMap<i64, PeriodStats> = BTreeMap::new();
        for entry in &resolved {
            let slot = per_day.entry(DateCodec::encode(entry.date)).or_default();
            tally(slot, entry, records, &mut skipped);
        }

        let (Some(&first), Some(&last)) = (per_day.keys().next(), per_day.keys().next_back())
        else {
            return Ok(Aggregated {
                output: Vec::new(),
                skipped,
            });
        };

        let mut window = PeriodStats::default();
        let mut output = Vec::with_capacity((last - first + 1) as usize);
        for serial in first..=last {
            if let Some(day) = per_day.get(&serial) {
                window.merge(day)?;
            }
            if let Some(leaving) = per_day.get(&(serial - window_days)) {
                window.unmerge(leaving)?;
            }
            output.push(RollingPoint {
                day: DateCodec::decode(serial as f64)?,
                window_count: window.count,
                window_sum: window.cost_sum,
                window_avg_cost: window.avg_cost(),
            });
        }

        debug!(
            "Rolling {}-day window over {} days, {} skipped",
            window_days,
            output.len(),
            skipped.len()
        );

        Ok(Aggregated { output, skipped })
    }

    /// First and last resolvable dates. `None` when no record resolves.
    pub fn span<T: DatedRecord>(records: &[T]) -> Option<DateRange> {
        let mut dates = records.iter().filter_map(|r| r.resolve_date().ok());
        let first = dates.next()?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        DateRange::new(min, max).ok()
    }

    /// Overall count, spend and number of distinct days.
    pub fn totals<T: DatedRecord>(records: &[T]) -> Aggregated<Totals> {
        let (resolved, mut skipped) = resolve_all(records);
        let mut stats = PeriodStats::default();
        let mut days: BTreeSet<CalendarDate> = BTreeSet::new();
        for entry in &resolved {
            if tally(&mut stats, entry, records, &mut skipped) {
                days.insert(entry.date);
            }
        }
        Aggregated {
            output: Totals {
                count: stats.count,
                cost_sum: stats.cost_sum,
                avg_cost: avg_cost(stats.cost_sum, stats.count),
                day_count: days.len() as u64,
            },
            skipped,
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Generic sparse bucketing driver. `key_fn` maps a day to its period.
    fn bucket<T: DatedRecord, K: Ord>(
        records: &[T],
        key_fn: impl Fn(CalendarDate) -> K,
    ) -> Aggregated<Vec<PeriodSummary<K>>> {
        let (resolved, mut skipped) = resolve_all(records);

        let mut map: BTreeMap<K, PeriodStats> = BTreeMap::new();
        for entry in &resolved {
            let slot = map.entry(key_fn(entry.date)).or_default();
            tally(slot, entry, records, &mut skipped);
        }

        Aggregated {
            output: map
                .into_iter()
                .map(|(period, stats)| stats.into_summary(period))
                .collect(),
            skipped,
        }
    }
}

/// A record that resolved, by position in the aggregated slice.
struct Resolved {
    index: usize,
    date: CalendarDate,
    cost: Option<Decimal>,
}

/// Resolve every record's date and check its cost, splitting the ones that
/// fail into a skip report.
fn resolve_all<T: DatedRecord>(records: &[T]) -> (Vec<Resolved>, Vec<SkippedRecord>) {
    let mut resolved = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let checked = record.resolve_date().and_then(|date| {
            let cost = record.cost().map(check_cost).transpose()?;
            Ok(Resolved { index, date, cost })
        });
        match checked {
            Ok(entry) => resolved.push(entry),
            Err(e) => skipped.push(SkippedRecord::from_error(index, record.raw_identity(), &e)),
        }
    }
    if !skipped.is_empty() {
        debug!("{} of {} records skipped", skipped.len(), records.len());
    }
    (resolved, skipped)
}

/// Add one resolved record to `stats`. A sum that would overflow skips the
/// record instead. Returns whether the record was counted.
fn tally<T: DatedRecord>(
    stats: &mut PeriodStats,
    entry: &Resolved,
    records: &[T],
    skipped: &mut Vec<SkippedRecord>,
) -> bool {
    match stats.add(entry.cost) {
        Ok(()) => true,
        Err(e) => {
            let identity = records[entry.index].raw_identity();
            skipped.push(SkippedRecord::from_error(entry.index, identity, &e));
            skipped.sort_by_key(|s| s.index);
            false
        }
    }
}

/// Order per-identity stats by count descending then display name.
fn identity_summaries(
    map: BTreeMap<CanonicalKey, (String, PeriodStats)>,
) -> Vec<PeriodSummary<CanonicalIdentity>> {
    let mut output: Vec<PeriodSummary<CanonicalIdentity>> = map
        .into_iter()
        .map(|(key, (display_name, stats))| {
            stats.into_summary(CanonicalIdentity { key, display_name })
        })
        .collect();
    output.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.period.display_name.cmp(&b.period.display_name))
    });
    output
}

// ── Tests ─────────────────────────────────────────────────────────────────────
