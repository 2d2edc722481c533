//! Text tables and JSON output for each view.

use std::collections::BTreeMap;

use ledger_core::error::SkippedRecord;
use ledger_core::formatting::{format_count, format_currency, percentage};
use ledger_core::models::PeriodSummary;
use ledger_core::settings::View;
use ledger_data::analysis::AnalysisResult;
use rust_decimal::Decimal;
use unicode_width::UnicodeWidthStr;

// ── TextTable ─────────────────────────────────────────────────────────────────

/// A plain aligned table. The first column is left-aligned, the rest right.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    totals: Option<Vec<String>>,
}

impl TextTable {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn set_totals(&mut self, row: Vec<String>) {
        self.totals = Some(row);
    }

    pub fn render(&self) -> String {
        let columns = self.headers.len();
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for row in self.rows.iter().chain(self.totals.iter()) {
            for (i, cell) in row.iter().enumerate().take(columns) {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let rule: String = widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ");

        let mut out = String::new();
        out.push_str(&self.format_row(&self.headers, &widths));
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&self.format_row(row, &widths));
            out.push('\n');
        }
        if let Some(totals) = &self.totals {
            out.push_str(&rule);
            out.push('\n');
            out.push_str(&self.format_row(totals, &widths));
            out.push('\n');
        }
        out
    }

    fn format_row(&self, row: &[String], widths: &[usize]) -> String {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = " ".repeat(w.saturating_sub(cell.width()));
                if i == 0 {
                    format!("{}{}", cell, pad)
                } else {
                    format!("{}{}", pad, cell)
                }
            })
            .collect();
        cells.join("  ").trim_end().to_string()
    }
}

// ── Views ─────────────────────────────────────────────────────────────────────

/// Render `view` as a text table.
pub fn render_table(view: View, result: &AnalysisResult) -> String {
    match view {
        View::Summary => summary_table(result),
        View::Monthly => period_table("Month", &result.monthly, |p| p.to_string()),
        View::MonthlyDense => match &result.monthly_dense {
            Some(dense) => period_table("Month", dense, |p| p.to_string()),
            None => "No data in range.\n".to_string(),
        },
        View::Weekly => period_table("Week", &result.weekly, |w| {
            format!("{} ({})", w.label, w.start)
        }),
        View::Weekday => share_table("Weekday", &result.weekday, |d| d.to_string()),
        View::Brokers => share_table("Broker", &result.identities, |id| id.display_name.clone()),
        View::BrokerMonthly => broker_monthly_table(result),
        View::Rolling => rolling_table(result),
        View::Duplicates => duplicates_table(result),
    }
}

/// Render `view` as pretty JSON. The summary view emits the whole result.
pub fn render_json(view: View, result: &AnalysisResult) -> serde_json::Result<String> {
    match view {
        View::Summary => serde_json::to_string_pretty(result),
        View::Monthly => serde_json::to_string_pretty(&result.monthly),
        View::MonthlyDense => serde_json::to_string_pretty(&result.monthly_dense),
        View::Weekly => serde_json::to_string_pretty(&result.weekly),
        View::Weekday => serde_json::to_string_pretty(&result.weekday),
        View::Brokers => serde_json::to_string_pretty(&result.identities),
        View::BrokerMonthly => serde_json::to_string_pretty(&result.identity_monthly),
        View::Rolling => serde_json::to_string_pretty(&result.rolling),
        View::Duplicates => serde_json::to_string_pretty(&result.duplicate_clusters),
    }
}

/// One line per stage describing what was left out, or `None` when nothing
/// was.
pub fn skip_summary(result: &AnalysisResult) -> Option<String> {
    if !result.has_skips() {
        return None;
    }
    let mut lines = Vec::new();
    if !result.rejected_rows.is_empty() {
        lines.push(format!(
            "warning: {} rows rejected at ingestion ({})",
            result.rejected_rows.len(),
            reason_counts(&result.rejected_rows)
        ));
    }
    if !result.skipped.is_empty() {
        lines.push(format!(
            "warning: {} records skipped ({})",
            result.skipped.len(),
            reason_counts(&result.skipped)
        ));
        for skip in result.skipped.iter().take(5) {
            lines.push(format!(
                "  #{} {:?}: {}",
                skip.index, skip.identity, skip.detail
            ));
        }
        if result.skipped.len() > 5 {
            lines.push(format!("  ... and {} more", result.skipped.len() - 5));
        }
    }
    Some(lines.join("\n"))
}

// ── Private renderers ─────────────────────────────────────────────────────────

fn reason_counts(skips: &[SkippedRecord]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for s in skips {
        *counts.entry(s.reason.to_string()).or_default() += 1;
    }
    counts
        .iter()
        .map(|(reason, n)| format!("{}: {}", reason, n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn period_table<K>(
    label: &str,
    summaries: &[PeriodSummary<K>],
    key: impl Fn(&K) -> String,
) -> String {
    if summaries.is_empty() {
        return "No data in range.\n".to_string();
    }
    let mut table = TextTable::new(&[label, "Leads", "Cost", "Avg Cost"]);
    let mut count = 0u64;
    let mut cost = Decimal::ZERO;
    for s in summaries {
        count = count.saturating_add(s.count);
        cost = cost.saturating_add(s.cost_sum);
        table.push_row(vec![
            key(&s.period),
            format_count(s.count),
            format_currency(s.cost_sum),
            format_currency(s.avg_cost),
        ]);
    }
    table.set_totals(vec![
        format!("TOTAL ({} periods)", summaries.len()),
        format_count(count),
        format_currency(cost),
        format_currency(ledger_core::models::avg_cost(cost, count)),
    ]);
    table.render()
}

fn share_table<K>(
    label: &str,
    summaries: &[PeriodSummary<K>],
    key: impl Fn(&K) -> String,
) -> String {
    let whole: u64 = summaries.iter().map(|s| s.count).sum();
    if whole == 0 {
        return "No data in range.\n".to_string();
    }
    let mut table = TextTable::new(&[label, "Leads", "Share", "Cost", "Avg Cost"]);
    for s in summaries {
        table.push_row(vec![
            key(&s.period),
            format_count(s.count),
            format!("{}%", percentage(s.count, whole, 1)),
            format_currency(s.cost_sum),
            format_currency(s.avg_cost),
        ]);
    }
    table.render()
}

fn rolling_table(result: &AnalysisResult) -> String {
    if result.rolling.is_empty() {
        return "No data in range.\n".to_string();
    }
    let mut table = TextTable::new(&["Day", "Window Leads", "Window Cost", "Window Avg"]);
    for p in &result.rolling {
        table.push_row(vec![
            p.day.to_string(),
            format_count(p.window_count),
            format_currency(p.window_sum),
            format_currency(p.window_avg_cost),
        ]);
    }
    table.render()
}

/// Brokers down, months across, lead counts in the cells. Brokers keep the
/// overall ranking of the brokers view.
fn broker_monthly_table(result: &AnalysisResult) -> String {
    if result.identity_monthly.is_empty() {
        return "No data in range.\n".to_string();
    }
    let months: Vec<String> = result
        .identity_monthly
        .iter()
        .map(|m| m.month.to_string())
        .collect();
    let mut headers: Vec<&str> = vec!["Broker"];
    headers.extend(months.iter().map(String::as_str));
    headers.push("Total");

    let mut table = TextTable::new(&headers);
    for broker in &result.identities {
        let mut row = vec![broker.period.display_name.clone()];
        for month in &result.identity_monthly {
            let count = month
                .identities
                .iter()
                .find(|s| s.period.key == broker.period.key)
                .map_or(0, |s| s.count);
            row.push(if count == 0 {
                "-".to_string()
            } else {
                format_count(count)
            });
        }
        row.push(format_count(broker.count));
        table.push_row(row);
    }

    let mut totals = vec!["TOTAL".to_string()];
    totals.extend(result.identity_monthly.iter().map(|m| {
        format_count(m.identities.iter().map(|s| s.count).sum())
    }));
    totals.push(format_count(result.totals.count));
    table.set_totals(totals);
    table.render()
}

fn duplicates_table(result: &AnalysisResult) -> String {
    if result.duplicate_clusters.is_empty() {
        return "No duplicate spellings found.\n".to_string();
    }
    let mut table = TextTable::new(&["Key", "Display Name", "Variants"]);
    for c in &result.duplicate_clusters {
        let variants = c
            .variants
            .iter()
            .map(|v| format!("{:?}", v))
            .collect::<Vec<_>>()
            .join(", ");
        table.push_row(vec![c.key.to_string(), c.display_name.clone(), variants]);
    }
    table.render()
}

fn summary_table(result: &AnalysisResult) -> String {
    let totals = &result.totals;
    let span = match &result.span {
        Some(s) => format!("{} to {}", s.start(), s.end()),
        None => "-".to_string(),
    };
    let mut table = TextTable::new(&["Metric", "Value"]);
    let rows = [
        ("Leads", format_count(totals.count)),
        ("Active days", format_count(totals.day_count)),
        ("Span", span),
        ("Total cost", format_currency(totals.cost_sum)),
        ("Avg cost", format_currency(totals.avg_cost)),
        ("Brokers", format_count(result.identities.len() as u64)),
        (
            "Duplicate spellings",
            format_count(result.duplicate_clusters.len() as u64),
        ),
        ("Skipped records", format_count(result.skipped.len() as u64)),
        ("Rejected rows", format_count(result.rejected_rows.len() as u64)),
    ];
    for (metric, value) in rows {
        table.push_row(vec![metric.to_string(), value]);
    }

    let mut out = table.render();
    out.push_str(&format!(
        "\nGenerated at {}\n",
        result.metadata.generated_at
    ));
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::canonical::NameCanonicalizer;
    use ledger_core::models::{Record, RecordDate};
    use ledger_data::analysis::{analyze, AnalysisRequest, DenseAxis};
    use rust_decimal_macros::dec;

    fn sample_result() -> AnalysisResult {
        let records = vec![
            Record::new("Linduo", RecordDate::Serial(45536.0)).with_cost(dec!(1200)),
            Record::new("linduo", RecordDate::Serial(45537.0)),
            Record::new("王伟", RecordDate::Text("2024-10-02".into())).with_cost(dec!(30)),
            Record::new("Ziv", RecordDate::Text("tomorrow".into())),
        ];
        let request = AnalysisRequest {
            dense_axis: Some(DenseAxis::default()),
            ..Default::default()
        };
        analyze(&records, &request, &mut NameCanonicalizer::new()).unwrap()
    }

    // ── TextTable ─────────────────────────────────────────────────────────────

    #[test]
    fn test_text_table_aligns_columns() {
        let mut table = TextTable::new(&["Name", "N"]);
        table.push_row(vec!["a".into(), "1".into()]);
        table.push_row(vec!["bbb".into(), "100".into()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Name    N");
        assert_eq!(lines[2], "a       1");
        assert_eq!(lines[3], "bbb   100");
    }

    #[test]
    fn test_text_table_measures_wide_characters() {
        let mut table = TextTable::new(&["Broker", "N"]);
        table.push_row(vec!["王伟".into(), "1".into()]);
        table.push_row(vec!["Amy".into(), "2".into()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        // "王伟" is four columns wide.
        assert_eq!(lines[2], "王伟    1");
        assert_eq!(lines[3], "Amy     2");
    }

    #[test]
    fn test_text_table_totals_row_after_rule() {
        let mut table = TextTable::new(&["K", "V"]);
        table.push_row(vec!["x".into(), "1".into()]);
        table.set_totals(vec!["TOTAL".into(), "1".into()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[3].starts_with('─'));
        assert!(lines[4].starts_with("TOTAL"));
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_monthly_table() {
        let out = render_table(View::Monthly, &sample_result());
        assert!(out.contains("2024-09"));
        assert!(out.contains("$1,200.00"));
        assert!(out.contains("$600.00"));
        assert!(out.contains("TOTAL (2 periods)"));
    }

    #[test]
    fn test_render_weekly_uses_label() {
        let out = render_table(View::Weekly, &sample_result());
        assert!(out.contains("2024/wk"));
    }

    #[test]
    fn test_render_brokers_share() {
        let out = render_table(View::Brokers, &sample_result());
        assert!(out.contains("Linduo"));
        assert!(out.contains("66.7%"));
        assert!(out.contains("33.3%"));
    }

    #[test]
    fn test_render_broker_monthly_matrix() {
        let out = render_table(View::BrokerMonthly, &sample_result());
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Broker"));
        assert!(lines[0].contains("2024-09"));
        assert!(lines[0].contains("2024-10"));
        assert!(lines[0].ends_with("Total"));
        assert!(lines[2].starts_with("Linduo"));
        assert!(lines[2].ends_with('2'));
        assert!(lines[3].starts_with("王伟"));
        assert!(lines[3].contains('-'));
        assert!(lines.last().unwrap().starts_with("TOTAL"));
        assert!(lines.last().unwrap().ends_with('3'));
    }

    #[test]
    fn test_render_summary_ends_with_timestamp() {
        let out = render_table(View::Summary, &sample_result());
        let last = out.lines().last().unwrap();
        assert!(last.starts_with("Generated at "));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_render_duplicates() {
        let out = render_table(View::Duplicates, &sample_result());
        assert!(out.contains(r#""Linduo", "linduo""#));
    }

    #[test]
    fn test_render_every_view_table_and_json() {
        let result = sample_result();
        for view in [
            View::Summary,
            View::Monthly,
            View::MonthlyDense,
            View::Weekly,
            View::Weekday,
            View::Rolling,
            View::Brokers,
            View::BrokerMonthly,
            View::Duplicates,
        ] {
            assert!(!render_table(view, &result).is_empty(), "{:?}", view);
            let json = render_json(view, &result).expect("json");
            serde_json::from_str::<serde_json::Value>(&json).expect("valid json");
        }
    }

    #[test]
    fn test_render_json_keeps_decimal_strings() {
        let json = render_json(View::Monthly, &sample_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["period"], "2024-09");
        assert_eq!(value[0]["count"], 2);
        assert_eq!(value[0]["cost_sum"], "1200");
    }

    #[test]
    fn test_skip_summary() {
        let summary = skip_summary(&sample_result()).expect("skips");
        assert!(summary.contains("1 records skipped (InvalidDate: 1)"));
        assert!(summary.contains("\"Ziv\""));
    }

    #[test]
    fn test_skip_summary_none_when_clean() {
        let records = vec![Record::new("Amy", RecordDate::Serial(45000.0))];
        let result = analyze(
            &records,
            &AnalysisRequest::default(),
            &mut NameCanonicalizer::new(),
        )
        .unwrap();
        assert!(skip_summary(&result).is_none());
    }
}
