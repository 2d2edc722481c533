use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use ledger_core::canonical::NameCanonicalizer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.broker-ledger/` and `~/.broker-ledger/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_directories_in(&home)
}

pub fn ensure_directories_in(home: &Path) -> anyhow::Result<()> {
    let ledger_dir = home.join(".broker-ledger");
    std::fs::create_dir_all(&ledger_dir)?;
    std::fs::create_dir_all(ledger_dir.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an [`EnvFilter`] directive. Unknown names are
/// passed through, so `RUST_LOG`-style directives also work.
fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr, or are appended to `log_file` without ANSI colours when
/// one is given. Falls back to `"info"` if the level string does not parse.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(filter_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Locate an export directory when none was given.
///
/// Checks `./data/` and then `~/.broker-ledger/data/`, returning the first
/// that exists.
pub fn discover_data_path() -> Option<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    discover_data_path_in(Path::new("."), &home)
}

fn discover_data_path_in(cwd: &Path, home: &Path) -> Option<PathBuf> {
    let candidates = [cwd.join("data"), home.join(".broker-ledger").join("data")];
    candidates.into_iter().find(|p| p.is_dir())
}

// ── Alias table ───────────────────────────────────────────────────────────────

/// Build a canonicalizer from a JSON object mapping raw spellings to display
/// names.
pub fn load_aliases(path: &Path) -> anyhow::Result<NameCanonicalizer> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading alias table {}", path.display()))?;
    let table: BTreeMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("parsing alias table {}", path.display()))?;
    tracing::debug!("Loaded {} aliases from {}", table.len(), path.display());
    Ok(NameCanonicalizer::with_aliases(table))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
