//! Export discovery and loading.
//!
//! Reads the JSON exports of the lead workbook (a JSON array of row objects,
//! or JSON Lines) and turns every row into a [`Record`]. Rows that cannot
//! become a record are returned in [`Ingested::rejected`], never dropped.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ledger_core::error::{LedgerError, Result, SkipReason, SkippedRecord};
use ledger_core::models::{check_cost, Record, RecordDate};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, warn};

// ── ColumnMap ─────────────────────────────────────────────────────────────────

/// Header spellings accepted for each column, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub identity: Vec<String>,
    pub date: Vec<String>,
    pub cost: Vec<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        Self {
            identity: owned(&["Broker", "broker", "identity"]),
            date: owned(&["Date", "date", "日期"]),
            cost: owned(&["Cost", "cost", "消费"]),
        }
    }
}

impl ColumnMap {
    /// The first listed header present in `row`, with its value.
    fn find<'a>(names: &'a [String], row: &'a Map<String, Value>) -> Option<(&'a str, &'a Value)> {
        names
            .iter()
            .find_map(|name| row.get(name).map(|v| (name.as_str(), v)))
    }
}

/// Result of loading one or more exports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingested {
    /// Records in file order, then row order.
    pub records: Vec<Record>,
    /// Rows that could not become a record. `index` counts every row seen.
    pub rejected: Vec<SkippedRecord>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.json` / `.jsonl` files recursively under `data_path`, sorted by
/// path.
pub fn find_export_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_export(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every row under `data_path`.
///
/// A file path is read directly and must be readable. A directory is walked
/// with [`find_export_files`]; unreadable files inside it are logged and
/// skipped.
pub fn load_records(data_path: &Path, columns: &ColumnMap) -> Result<Ingested> {
    if !data_path.exists() {
        return Err(LedgerError::DataPathNotFound(data_path.to_path_buf()));
    }

    let mut ingested = Ingested::default();
    let mut next_index = 0usize;

    if data_path.is_file() {
        let rows = read_rows(data_path)?;
        ingest_rows(rows, columns, &mut next_index, &mut ingested);
        debug!(
            "Loaded {} records ({} rejected) from {}",
            ingested.records.len(),
            ingested.rejected.len(),
            data_path.display()
        );
        return Ok(ingested);
    }

    let files = find_export_files(data_path);
    if files.is_empty() {
        return Err(LedgerError::NoDataFiles(data_path.to_path_buf()));
    }

    for file in &files {
        let rows = match read_rows(file) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                continue;
            }
        };
        let before = (ingested.records.len(), ingested.rejected.len());
        ingest_rows(rows, columns, &mut next_index, &mut ingested);
        debug!(
            "File {}: {} records, {} rejected",
            file.display(),
            ingested.records.len() - before.0,
            ingested.rejected.len() - before.1,
        );
    }

    debug!(
        "Loaded {} records from {} files",
        ingested.records.len(),
        files.len()
    );
    Ok(ingested)
}

/// Turn rows that are already in memory into records.
pub fn ingest_values(rows: Vec<Value>, columns: &ColumnMap) -> Ingested {
    let mut ingested = Ingested::default();
    let mut next_index = 0usize;
    let rows = rows.into_iter().map(Ok).collect();
    ingest_rows(rows, columns, &mut next_index, &mut ingested);
    ingested
}

/// Convert one row object into a [`Record`].
///
/// The matched identity, date and cost columns are lifted out. Every other
/// field is kept in [`Record::extra`].
pub fn row_to_record(row: &Value, columns: &ColumnMap) -> Result<Record> {
    let obj = row.as_object().ok_or_else(|| {
        LedgerError::Config(format!("row is not an object: {}", truncate(&row.to_string())))
    })?;

    let identity_col = ColumnMap::find(&columns.identity, obj);
    let date_col = ColumnMap::find(&columns.date, obj);
    let cost_col = ColumnMap::find(&columns.cost, obj);

    let identity = match identity_col.map(|(_, v)| v) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let date = match date_col.map(|(_, v)| v) {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(serial) => RecordDate::Serial(serial),
            None => RecordDate::Text(n.to_string()),
        },
        Some(Value::String(s)) => RecordDate::Text(s.clone()),
        Some(Value::Null) | None => RecordDate::Text(String::new()),
        Some(other) => RecordDate::Text(other.to_string()),
    };

    let cost = match cost_col.map(|(_, v)| v) {
        Some(v) => parse_cost(v)?,
        None => None,
    };

    let lifted: Vec<&str> = [identity_col, date_col, cost_col]
        .into_iter()
        .flatten()
        .map(|(name, _)| name)
        .collect();
    let extra: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !lifted.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(Record {
        identity,
        date,
        cost,
        extra,
    })
}

/// Parse a cost cell.
///
/// Null and blank cells are untracked (`None`). Numbers and numeric strings
/// (thousands separators allowed) must be non-negative and no larger than
/// [`MAX_COST`](ledger_core::models::MAX_COST).
pub fn parse_cost(value: &Value) -> Result<Option<Decimal>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.replace(',', "")
        }
        other => return Err(LedgerError::InvalidCost(other.to_string())),
    };

    let cost = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| LedgerError::InvalidCost(format!("{:?}", text)))?;

    Ok(Some(check_cost(cost)?.normalize()))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_export(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "json" || ext == "jsonl")
        .unwrap_or(false)
}

/// Read one file into rows. A JSON array yields its elements; anything else
/// is treated as JSON Lines, where an unparsable line becomes an `Err` row.
fn read_rows(path: &Path) -> Result<Vec<std::result::Result<Value, String>>> {
    let content = std::fs::read_to_string(path).map_err(|source| LedgerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim_start().starts_with('[') {
        let rows: Vec<Value> = serde_json::from_str(&content)?;
        return Ok(rows.into_iter().map(Ok).collect());
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| e.to_string()))
        .collect())
}

fn ingest_rows(
    rows: Vec<std::result::Result<Value, String>>,
    columns: &ColumnMap,
    next_index: &mut usize,
    out: &mut Ingested,
) {
    for row in rows {
        let index = *next_index;
        *next_index += 1;

        let value = match row {
            Ok(v) => v,
            Err(e) => {
                out.rejected.push(SkippedRecord {
                    index,
                    identity: String::new(),
                    reason: SkipReason::MalformedRow,
                    detail: e,
                });
                continue;
            }
        };

        match row_to_record(&value, columns) {
            Ok(record) => out.records.push(record),
            Err(e) => {
                let identity = value
                    .as_object()
                    .and_then(|obj| ColumnMap::find(&columns.identity, obj))
                    .and_then(|(_, v)| v.as_str())
                    .unwrap_or_default();
                out.rejected
                    .push(SkippedRecord::from_error(index, identity, &e));
            }
        }
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 60;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    fn row(broker: &str, date: Value, cost: Value) -> Value {
        json!({ "Broker": broker, "Date": date, "Cost": cost, "Wechat": "wx-1" })
    }

    // ── find_export_files ─────────────────────────────────────────────────────

    #[test]
    fn test_find_export_files_recursive_and_sorted() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("2024");
        std::fs::create_dir_all(&sub).unwrap();
        write_file(tmp.path(), "b.json", "[]");
        write_file(tmp.path(), "a.jsonl", "");
        write_file(&sub, "c.json", "[]");
        write_file(tmp.path(), "notes.txt", "x");

        let names: Vec<String> = find_export_files(tmp.path())
            .iter()
            .map(|p| {
                p.strip_prefix(tmp.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["2024/c.json", "a.jsonl", "b.json"]);
    }

    #[test]
    fn test_find_export_files_nonexistent_path() {
        assert!(find_export_files(Path::new("/definitely/not/here")).is_empty());
    }

    // ── row_to_record ─────────────────────────────────────────────────────────

    #[test]
    fn test_row_to_record_serial_date_and_passthrough() {
        let record = row_to_record(&row("Linduo", json!(45566), json!(12.5)), &ColumnMap::default())
            .unwrap();
        assert_eq!(record.identity, "Linduo");
        assert_eq!(record.date, RecordDate::Serial(45566.0));
        assert_eq!(record.cost, Some(dec!(12.5)));
        assert_eq!(record.extra.get("Wechat"), Some(&json!("wx-1")));
        assert!(!record.extra.contains_key("Broker"));
        assert!(!record.extra.contains_key("Date"));
    }

    #[test]
    fn test_row_to_record_lowercase_and_chinese_headers() {
        let value = json!({ "broker": "Ziv", "日期": "2024-10-01", "消费": "1,200.00" });
        let record = row_to_record(&value, &ColumnMap::default()).unwrap();
        assert_eq!(record.identity, "Ziv");
        assert_eq!(record.date, RecordDate::Text("2024-10-01".into()));
        assert_eq!(record.cost, Some(dec!(1200)));
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_row_to_record_missing_fields() {
        let record = row_to_record(&json!({ "Name": "x" }), &ColumnMap::default()).unwrap();
        assert_eq!(record.identity, "");
        assert_eq!(record.date, RecordDate::Text(String::new()));
        assert_eq!(record.cost, None);
    }

    #[test]
    fn test_row_to_record_custom_columns() {
        let columns = ColumnMap {
            identity: vec!["Agent".into()],
            date: vec!["When".into()],
            cost: vec!["Spend".into()],
        };
        let value = json!({ "Agent": "Amy", "When": 45000, "Spend": 3 });
        let record = row_to_record(&value, &columns).unwrap();
        assert_eq!(record.identity, "Amy");
        assert_eq!(record.cost, Some(dec!(3)));
    }

    #[test]
    fn test_row_to_record_rejects_non_object() {
        assert!(row_to_record(&json!([1, 2]), &ColumnMap::default()).is_err());
    }

    // ── parse_cost ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_cost_untracked() {
        assert_eq!(parse_cost(&Value::Null).unwrap(), None);
        assert_eq!(parse_cost(&json!("  ")).unwrap(), None);
    }

    #[test]
    fn test_parse_cost_zero_is_tracked() {
        assert_eq!(parse_cost(&json!(0)).unwrap(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_parse_cost_rejects_negative_and_garbage() {
        for bad in [json!(-1), json!("-0.5"), json!("n/a"), json!(true)] {
            assert!(
                matches!(parse_cost(&bad), Err(LedgerError::InvalidCost(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_parse_cost_rejects_above_ceiling() {
        assert!(parse_cost(&json!("1,000,000,000,000,000")).is_ok());
        for bad in [
            json!("79228162514264337593543950335"),
            json!("1000000000000000.01"),
            json!(1e16),
        ] {
            assert!(
                matches!(parse_cost(&bad), Err(LedgerError::InvalidCost(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_huge_costs_are_rejected_and_aggregation_survives() {
        let ingested = ingest_values(
            vec![
                row("Amy", json!(45000), json!("79228162514264337593543950335")),
                row("Amy", json!(45000), json!("1")),
            ],
            &ColumnMap::default(),
        );
        assert_eq!(ingested.records.len(), 1);
        assert_eq!(ingested.rejected.len(), 1);
        assert_eq!(ingested.rejected[0].reason, SkipReason::InvalidCost);

        let monthly = crate::aggregator::PeriodAggregator::monthly(&ingested.records);
        assert_eq!(monthly.output[0].count, 1);
        assert_eq!(monthly.output[0].cost_sum, Decimal::ONE);
    }

    // ── load_records ──────────────────────────────────────────────────────────

    #[test]
    fn test_load_records_json_array() {
        let tmp = TempDir::new().unwrap();
        let rows = json!([
            row("Linduo", json!(45536), json!(10)),
            row("linduo", json!("2024-09-02"), Value::Null),
        ]);
        let path = write_file(tmp.path(), "leads.json", &rows.to_string());

        let ingested = load_records(&path, &ColumnMap::default()).unwrap();
        assert_eq!(ingested.records.len(), 2);
        assert!(ingested.rejected.is_empty());
        assert_eq!(ingested.records[1].identity, "linduo");
    }

    #[test]
    fn test_load_records_jsonl_with_bad_rows() {
        let tmp = TempDir::new().unwrap();
        let content = [
            row("Amy", json!(45000), json!(1)).to_string(),
            "{not json".to_string(),
            row("Ziv", json!(45001), json!(-4)).to_string(),
            String::new(),
            "42".to_string(),
            row("Yuki", json!(45002), Value::Null).to_string(),
        ]
        .join("\n");
        let path = write_file(tmp.path(), "leads.jsonl", &content);

        let ingested = load_records(&path, &ColumnMap::default()).unwrap();
        let names: Vec<&str> = ingested.records.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Yuki"]);

        let reasons: Vec<(usize, SkipReason)> = ingested
            .rejected
            .iter()
            .map(|s| (s.index, s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (1, SkipReason::MalformedRow),
                (2, SkipReason::InvalidCost),
                (3, SkipReason::MalformedRow),
            ]
        );
        assert_eq!(ingested.rejected[1].identity, "Ziv");
    }

    #[test]
    fn test_load_records_directory_keeps_file_order() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "02.json",
            &json!([row("Second", json!(45001), Value::Null)]).to_string(),
        );
        write_file(
            tmp.path(),
            "01.json",
            &json!([row("First", json!(45000), Value::Null)]).to_string(),
        );
        write_file(tmp.path(), "broken.json", "[{");

        let ingested = load_records(tmp.path(), &ColumnMap::default()).unwrap();
        let names: Vec<&str> = ingested.records.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_load_records_missing_path() {
        let err = load_records(Path::new("/no/such/export.json"), &ColumnMap::default())
            .unwrap_err();
        assert!(matches!(err, LedgerError::DataPathNotFound(_)));
    }

    #[test]
    fn test_load_records_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let err = load_records(tmp.path(), &ColumnMap::default()).unwrap_err();
        assert!(matches!(err, LedgerError::NoDataFiles(_)));
    }

    #[test]
    fn test_ingest_values_in_memory() {
        let ingested = ingest_values(
            vec![row("Amy", json!(45000), json!("2.50")), json!("oops")],
            &ColumnMap::default(),
        );
        assert_eq!(ingested.records.len(), 1);
        assert_eq!(ingested.records[0].cost, Some(dec!(2.5)));
        assert_eq!(ingested.rejected[0].reason, SkipReason::MalformedRow);
    }
}
