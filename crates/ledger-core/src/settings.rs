use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::calendar::{CalendarDate, DateRange, YearMonth};
use crate::error::{LedgerError, Result};

/// Rolling window length used when nothing else is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Date, period and identity reports over broker activity exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "broker-ledger",
    about = "Date, period and identity reports over broker activity exports",
    version
)]
pub struct Settings {
    /// Export file (.json / .jsonl) or a directory of exports
    pub data: Option<PathBuf>,

    /// Report to produce
    #[arg(long, default_value = "summary", value_parser = [
        "summary", "monthly", "monthly-dense", "weekly", "weekday", "rolling", "brokers",
        "broker-monthly", "duplicates",
    ])]
    pub view: String,

    /// First day of the range filter (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: Option<String>,

    /// Last day of the range filter (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: Option<String>,

    /// Rolling window length in days
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS, allow_negative_numbers = true)]
    pub window: i64,

    /// First month of the dense monthly axis (YYYY-MM)
    #[arg(long)]
    pub from_month: Option<String>,

    /// Last month of the dense monthly axis (YYYY-MM)
    #[arg(long)]
    pub to_month: Option<String>,

    /// JSON file mapping raw broker spellings to display names
    #[arg(long)]
    pub aliases: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── Typed views of the string settings ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Summary,
    Monthly,
    MonthlyDense,
    Weekly,
    Weekday,
    Rolling,
    Brokers,
    BrokerMonthly,
    Duplicates,
}

impl View {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "summary" => View::Summary,
            "monthly" => View::Monthly,
            "monthly-dense" => View::MonthlyDense,
            "weekly" => View::Weekly,
            "weekday" => View::Weekday,
            "rolling" => View::Rolling,
            "brokers" => View::Brokers,
            "broker-monthly" => View::BrokerMonthly,
            "duplicates" => View::Duplicates,
            other => return Err(LedgerError::Config(format!("unknown view {:?}", other))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(LedgerError::Config(format!("unknown format {:?}", other))),
        }
    }
}

/// Parameters checked and converted before any data is read.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings {
    pub data: PathBuf,
    pub view: View,
    pub format: OutputFormat,
    /// `None` when neither `--from` nor `--to` was given.
    pub range: Option<DateRange>,
    pub window_days: i64,
    /// Dense axis bounds. A missing bound falls back to the observed span.
    pub from_month: Option<YearMonth>,
    pub to_month: Option<YearMonth>,
    pub aliases: Option<PathBuf>,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.broker-ledger/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// `~/.broker-ledger/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".broker-ledger").join("last_used.json")
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories if
    /// needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, fill unset values from the last run and persist
    /// the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. Range bounds and aliases are per-run and never
        // persisted.
        if settings.data.is_none() {
            settings.data = last.data;
        }
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "window") {
            if let Some(v) = last.window {
                settings.window = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Convert the string arguments into typed values.
    ///
    /// Every parameter error surfaces here, before any data is touched:
    /// an unparsable or reversed range, a non-positive window, a bad month
    /// or a reversed dense axis.
    pub fn validate(&self) -> Result<ValidatedSettings> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| LedgerError::Config("no data path given".to_string()))?;

        let from = self.from.as_deref().map(str::parse::<CalendarDate>).transpose()?;
        let to = self.to.as_deref().map(str::parse::<CalendarDate>).transpose()?;
        let range = match (from, to) {
            (None, None) => None,
            (start, end) => Some(DateRange::from_bounds(start, end)?),
        };

        if self.window <= 0 {
            return Err(LedgerError::InvalidWindow(self.window));
        }

        let from_month = self
            .from_month
            .as_deref()
            .map(str::parse::<YearMonth>)
            .transpose()?;
        let to_month = self
            .to_month
            .as_deref()
            .map(str::parse::<YearMonth>)
            .transpose()?;
        if let (Some(a), Some(b)) = (from_month, to_month) {
            if a > b {
                return Err(LedgerError::InvalidRange {
                    start: a.to_string(),
                    end: b.to_string(),
                });
            }
        }

        Ok(ValidatedSettings {
            data,
            view: View::parse(&self.view)?,
            format: OutputFormat::parse(&self.format)?,
            range,
            window_days: self.window,
            from_month,
            to_month,
            aliases: self.aliases.clone(),
        })
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data: s.data.clone(),
            view: Some(s.view.clone()),
            window: Some(s.window),
            format: Some(s.format.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied on the command line rather than by
/// a default.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
