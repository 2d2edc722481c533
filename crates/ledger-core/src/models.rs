use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calendar::CalendarDate;
use crate::canonical::CanonicalIdentity;
use crate::date_codec::DateCodec;
use crate::error::{LedgerError, Result};

/// The date cell of a record, in whichever form ingestion found it.
///
/// Resolved to a [`CalendarDate`] exactly once, through [`RecordDate::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordDate {
    /// A spreadsheet serial, possibly carrying a time-of-day fraction.
    Serial(f64),
    /// Date text, expected to be ISO `YYYY-MM-DD`.
    Text(String),
}

impl RecordDate {
    /// Resolve to a calendar day.
    ///
    /// Serials go through [`DateCodec::decode`], text through
    /// [`DateCodec::parse_text`].
    pub fn resolve(&self) -> Result<CalendarDate> {
        match self {
            RecordDate::Serial(serial) => DateCodec::decode(*serial),
            RecordDate::Text(text) => DateCodec::parse_text(text),
        }
    }
}

impl From<CalendarDate> for RecordDate {
    fn from(date: CalendarDate) -> Self {
        RecordDate::Text(date.to_string())
    }
}

/// One client-contact event as produced by ingestion.
///
/// The core only ever reads records; normalisation builds a
/// [`NormalizedRecord`] view instead of touching these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Raw broker name as recorded.
    pub identity: String,
    pub date: RecordDate,
    /// Tracked spend. `None` means untracked, which is not the same as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    /// Every other column, untouched.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(identity: impl Into<String>, date: RecordDate) -> Self {
        Self {
            identity: identity.into(),
            date,
            cost: None,
            extra: Map::new(),
        }
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A record paired with its resolved day and canonical identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord<'a> {
    pub record: &'a Record,
    pub date: CalendarDate,
    pub identity: CanonicalIdentity,
}

/// Anything a filter or aggregation pass can place on the calendar.
///
/// Raw [`Record`]s resolve their date on every call; a [`NormalizedRecord`]
/// has already done so.
pub trait DatedRecord {
    fn resolve_date(&self) -> Result<CalendarDate>;

    fn cost(&self) -> Option<Decimal>;

    /// Raw identity, for skip reports.
    fn raw_identity(&self) -> &str;
}

impl DatedRecord for Record {
    fn resolve_date(&self) -> Result<CalendarDate> {
        self.date.resolve()
    }

    fn cost(&self) -> Option<Decimal> {
        self.cost
    }

    fn raw_identity(&self) -> &str {
        &self.identity
    }
}

impl DatedRecord for NormalizedRecord<'_> {
    fn resolve_date(&self) -> Result<CalendarDate> {
        Ok(self.date)
    }

    fn cost(&self) -> Option<Decimal> {
        self.record.cost
    }

    fn raw_identity(&self) -> &str {
        &self.record.identity
    }
}

impl<T: DatedRecord + ?Sized> DatedRecord for &T {
    fn resolve_date(&self) -> Result<CalendarDate> {
        (**self).resolve_date()
    }

    fn cost(&self) -> Option<Decimal> {
        (**self).cost()
    }

    fn raw_identity(&self) -> &str {
        (**self).raw_identity()
    }
}

// ── Period summaries ──────────────────────────────────────────────────────────

/// `cost_sum / count`, or exactly zero when `count` is zero.
pub fn avg_cost(cost_sum: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    cost_sum
        .checked_div(Decimal::from(count))
        .unwrap_or(Decimal::ZERO)
}

/// Count and tracked spend for one period, keyed by `K`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary<K> {
    pub period: K,
    /// Records matched, with or without a cost.
    pub count: u64,
    /// Sum of the costs that were present.
    pub cost_sum: Decimal,
    pub avg_cost: Decimal,
}

impl<K> PeriodSummary<K> {
    /// An explicit zero bucket.
    pub fn empty(period: K) -> Self {
        Self {
            period,
            count: 0,
            cost_sum: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
        }
    }
}

/// Largest cost one record may carry: 10^15.
///
/// Summing fewer than 7.9 * 10^13 such costs stays inside [`Decimal::MAX`].
pub const MAX_COST: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Accept a cost that is non-negative and no larger than [`MAX_COST`].
pub fn check_cost(cost: Decimal) -> Result<Decimal> {
    if cost.is_sign_negative() && !cost.is_zero() {
        return Err(LedgerError::InvalidCost(format!("{} is negative", cost)));
    }
    if cost > MAX_COST {
        return Err(LedgerError::InvalidCost(format!(
            "{} exceeds the {} ceiling",
            cost, MAX_COST
        )));
    }
    Ok(cost)
}

/// Running count/spend accumulator used while bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodStats {
    pub count: u64,
    pub cost_sum: Decimal,
}

impl PeriodStats {
    /// Count one record. An absent cost adds nothing to the sum.
    ///
    /// Fails with `InvalidCost`, leaving `self` untouched, when the sum would
    /// overflow.
    pub fn add(&mut self, cost: Option<Decimal>) -> Result<()> {
        if let Some(c) = cost {
            self.cost_sum = checked_sum(self.cost_sum, c)?;
        }
        self.count = self.count.saturating_add(1);
        Ok(())
    }

    pub fn merge(&mut self, other: &PeriodStats) -> Result<()> {
        self.cost_sum = checked_sum(self.cost_sum, other.cost_sum)?;
        self.count = self.count.saturating_add(other.count);
        Ok(())
    }

    /// Undo an earlier [`PeriodStats::merge`] of `other`.
    pub fn unmerge(&mut self, other: &PeriodStats) -> Result<()> {
        self.cost_sum = self.cost_sum.checked_sub(other.cost_sum).ok_or_else(|| {
            LedgerError::InvalidCost(format!(
                "cost sum underflowed removing {} from {}",
                other.cost_sum, self.cost_sum
            ))
        })?;
        self.count = self.count.saturating_sub(other.count);
        Ok(())
    }

    pub fn avg_cost(&self) -> Decimal {
        avg_cost(self.cost_sum, self.count)
    }

    pub fn into_summary<K>(self, period: K) -> PeriodSummary<K> {
        PeriodSummary {
            period,
            count: self.count,
            cost_sum: self.cost_sum,
            avg_cost: self.avg_cost(),
        }
    }
}

fn checked_sum(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| {
        LedgerError::InvalidCost(format!("cost sum overflowed adding {} to {}", b, a))
    })
}

/// One day of a trailing-window series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub day: CalendarDate,
    pub window_count: u64,
    pub window_sum: Decimal,
    pub window_avg_cost: Decimal,
}

/// Overall figures for a record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub count: u64,
    pub cost_sum: Decimal,
    pub avg_cost: Decimal,
    /// Distinct calendar days with at least one record.
    pub day_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ── RecordDate ────────────────────────────────────────────────────────────

    #[test]
    fn test_record_date_serial_and_text_resolve_to_same_day() {
        let a = RecordDate::Serial(45000.0).resolve().unwrap();
        let b = RecordDate::Text("2023-03-15".into()).resolve().unwrap();
        let c = RecordDate::Serial(45000.9).resolve().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_record_date_untagged_serde() {
        let serial: RecordDate = serde_json::from_str("45000.25").unwrap();
        assert_eq!(serial, RecordDate::Serial(45000.25));
        let text: RecordDate = serde_json::from_str(r#""2024-10-01""#).unwrap();
        assert_eq!(text, RecordDate::Text("2024-10-01".into()));
    }

    #[test]
    fn test_record_from_json_keeps_passthrough_fields() {
        let json = r#"{"identity":"Ziv","date":45000,"cost":"12.50","wechat":"abc","no":7}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.identity, "Ziv");
        assert_eq!(record.cost, Some(dec!(12.50)));
        assert_eq!(record.extra.get("wechat"), Some(&Value::from("abc")));
        assert_eq!(record.extra.get("no"), Some(&Value::from(7)));
    }

    // ── avg_cost / PeriodStats ────────────────────────────────────────────────

    #[test]
    fn test_avg_cost_zero_count_is_exact_zero() {
        assert_eq!(avg_cost(dec!(0), 0), Decimal::ZERO);
        assert_eq!(avg_cost(dec!(15.5), 0), Decimal::ZERO);
    }

    #[test]
    fn test_avg_cost_divides() {
        assert_eq!(avg_cost(dec!(30), 4), dec!(7.5));
    }

    #[test]
    fn test_period_stats_absent_cost_counts_but_adds_nothing() {
        let mut stats = PeriodStats::default();
        stats.add(None).unwrap();
        stats.add(None).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.cost_sum, Decimal::ZERO);
        assert_eq!(stats.avg_cost(), Decimal::ZERO);
    }

    #[test]
    fn test_period_stats_merge_unmerge() {
        let mut day = PeriodStats::default();
        day.add(Some(dec!(10))).unwrap();
        day.add(None).unwrap();
        let mut window = PeriodStats::default();
        window.add(Some(dec!(5))).unwrap();
        window.merge(&day).unwrap();
        assert_eq!(window.count, 3);
        assert_eq!(window.cost_sum, dec!(15));
        window.unmerge(&day).unwrap();
        assert_eq!(window.count, 1);
        assert_eq!(window.cost_sum, dec!(5));
    }

    #[test]
    fn test_period_stats_overflow_is_an_error_not_a_panic() {
        let mut stats = PeriodStats::default();
        stats.add(Some(Decimal::MAX)).unwrap();
        let err = stats.add(Some(dec!(1))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCost(_)));
        assert_eq!(stats.count, 1);
        assert_eq!(stats.cost_sum, Decimal::MAX);

        let copy = stats;
        assert!(stats.merge(&copy).is_err());
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_check_cost_bounds() {
        assert_eq!(MAX_COST, dec!(1_000_000_000_000_000));
        assert_eq!(check_cost(Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_eq!(check_cost(MAX_COST).unwrap(), MAX_COST);
        assert!(check_cost(MAX_COST + dec!(0.01)).is_err());
        assert!(check_cost(Decimal::MAX).is_err());
        assert!(check_cost(dec!(-0.5)).is_err());
    }

    #[test]
    fn test_dated_record_normalized_uses_resolved_date() {
        let record = Record::new("Ziv", RecordDate::Text("not a date".into())).with_cost(dec!(3));
        assert!(record.resolve_date().is_err());
        let normalized = NormalizedRecord {
            record: &record,
            date: CalendarDate::new(2024, 9, 1).unwrap(),
            identity: crate::canonical::NameCanonicalizer::new().register("Ziv"),
        };
        assert_eq!(normalized.resolve_date().unwrap().to_string(), "2024-09-01");
        assert_eq!(normalized.cost(), Some(dec!(3)));
        assert_eq!(normalized.raw_identity(), "Ziv");
    }

    #[test]
    fn test_period_summary_empty() {
        let s = PeriodSummary::empty("2024-09");
        assert_eq!(s.count, 0);
        assert_eq!(s.avg_cost, Decimal::ZERO);
    }

    #[test]
    fn test_period_summary_serde_keeps_decimal_precision() {
        let mut stats = PeriodStats::default();
        for _ in 0..3 {
            stats.add(Some(dec!(0.1))).unwrap();
        }
        let summary = stats.into_summary(crate::calendar::YearMonth::new(2024, 10).unwrap());
        let json = serde_json::to_string(&summary).unwrap();
        let back: PeriodSummary<crate::calendar::YearMonth> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cost_sum, dec!(0.3));
        assert_eq!(back, summary);
    }
}
