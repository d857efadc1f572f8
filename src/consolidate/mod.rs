//! Stage 3: processed theme tables -> long-format consolidated bases
//! (FULL, DASHBOARD and the rich DASHBOARD variant).

pub mod format;
pub mod long;
pub mod selection;
pub mod stream;
pub mod value;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{BaseKind, OutputFormat, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::ingest::read_validation_report;

pub use format::{finalize, FinalOutput};
pub use long::{long_schema, to_long, value_columns, LongOptions};
pub use selection::{select_dashboard_ids, DashboardSelection, SelectionSource};
pub use stream::{discover_processed_files, stream_long_csv, IndicatorIndex, StreamSource, StreamStats};
pub use value::{is_value_column, parse_decimal, Notation};

/// What one consolidated base ended up as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationSummary {
    pub kind: &'static str,
    pub path: PathBuf,
    /// Effective format; differs from the requested one after a parquet fallback.
    pub format: OutputFormat,
    pub requested_format: OutputFormat,
    #[serde(flatten)]
    pub stats: StreamStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationOutcome {
    pub selection: DashboardSelection,
    pub outputs: Vec<ConsolidationSummary>,
}

fn write_base(
    config: &PipelineConfig,
    source: &StreamSource<'_>,
    kind: BaseKind,
    filter: Option<&HashSet<String>>,
) -> Result<ConsolidationSummary> {
    let settings = &config.consolidation;
    let requested = settings.format_for(kind);
    let intermediate = config.base_path(kind, OutputFormat::Csv);

    let stats = stream_long_csv(source, &intermediate, LongOptions::for_kind(settings, kind), filter)?;
    let output = finalize(
        &intermediate,
        requested,
        config.separator_byte(),
        settings.keep_intermediate_csv,
    )?;
    info!(
        base = kind.label(),
        file = %output.path.display(),
        format = output.format.as_str(),
        rows = stats.rows_written,
        files = stats.files_read,
        "consolidated base written"
    );
    Ok(ConsolidationSummary {
        kind: kind.label(),
        path: output.path,
        format: output.format,
        requested_format: requested,
        stats,
    })
}

/// Write every enabled base. The dashboard bases are skipped when the
/// selection is empty.
pub fn run_consolidation(config: &PipelineConfig) -> Result<ConsolidationOutcome> {
    let csv_root = config.processed_csv_dir();
    if !csv_root.is_dir() {
        return Err(PipelineError::missing("processed CSV directory", &csv_root));
    }
    config.ensure_dirs()?;

    let index = match read_validation_report(&config.validation_report_path()) {
        Ok(rows) => IndicatorIndex::from_report(&rows),
        Err(err) => {
            warn!(error = %err, "validation report unavailable, indicator ids derived from paths");
            IndicatorIndex::default()
        }
    };
    let files = discover_processed_files(&csv_root);
    info!(root = %csv_root.display(), files = files.len(), "processed files found");

    let source = StreamSource {
        csv_root: &csv_root,
        files: &files,
        index: &index,
        separator: config.separator_byte(),
    };
    let settings = &config.consolidation;
    let selection = select_dashboard_ids(config)?;
    info!(
        source = ?selection.source,
        indicators = selection.ids.len(),
        "dashboard selection"
    );

    let mut outputs = Vec::new();
    if settings.generate_full {
        outputs.push(write_base(config, &source, BaseKind::Full, None)?);
    }
    if settings.generate_dashboard {
        if selection.is_empty() {
            info!("no dashboard indicators selected, dashboard bases skipped");
        } else {
            let ids = selection.id_set();
            outputs.push(write_base(config, &source, BaseKind::Dashboard, Some(&ids))?);
            if settings.generate_dashboard_rich {
                outputs.push(write_base(config, &source, BaseKind::DashboardRich, Some(&ids))?);
            }
        }
    }
    Ok(ConsolidationOutcome { selection, outputs })
}
