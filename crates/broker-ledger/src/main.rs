mod bootstrap;
mod render;

use anyhow::Result;
use ledger_core::canonical::NameCanonicalizer;
use ledger_core::settings::{OutputFormat, Settings, View};
use ledger_data::analysis::{analyze_ingested, AnalysisRequest};
use ledger_data::reader::{load_records, ColumnMap};

fn main() -> Result<()> {
    let mut settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Broker Ledger v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.data.is_none() {
        settings.data = bootstrap::discover_data_path();
    }
    let validated = settings.validate()?;
    tracing::info!(
        "View: {:?}, data: {}",
        validated.view,
        validated.data.display()
    );

    let mut canonicalizer = match &validated.aliases {
        Some(path) => bootstrap::load_aliases(path)?,
        None => NameCanonicalizer::new(),
    };

    let ingested = load_records(&validated.data, &ColumnMap::default())?;

    let mut request = AnalysisRequest::from(&validated);
    let wants_dense = validated.view == View::MonthlyDense
        || (validated.format == OutputFormat::Json && validated.view == View::Summary)
        || validated.from_month.is_some()
        || validated.to_month.is_some();
    if !wants_dense {
        request.dense_axis = None;
    }

    let result = analyze_ingested(&ingested, &request, &mut canonicalizer)?;

    let output = match validated.format {
        OutputFormat::Table => render::render_table(validated.view, &result),
        OutputFormat::Json => render::render_json(validated.view, &result)?,
    };
    println!("{}", output.trim_end());

    if let Some(summary) = render::skip_summary(&result) {
        eprintln!("{}", summary);
    }

    Ok(())
}
