//! Stage 2: one catalog row per processed theme file, then the curated overlay sync.

pub mod builder;
pub mod curated;

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingest::read_validation_report;
use crate::table::{write_table, write_workbook};

pub use builder::{build_catalog, catalog_table, infer_period, infer_unit, value_variables, CatalogEntry};
pub use curated::{flagged_ids, is_truthy, merge_curated, read_curated, sync_curated, SyncOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogOutcome {
    pub entries: usize,
    /// Report rows whose processed file was missing or unreadable.
    pub omitted: usize,
    pub csv_path: PathBuf,
    pub xlsx_path: Option<PathBuf>,
    pub curated_path: PathBuf,
    pub curated_added: usize,
    pub curated_removed: usize,
}

/// Build the catalog from the validation report, write it as CSV and XLSX,
/// and synchronize the curated copy.
pub fn run_catalog(config: &PipelineConfig) -> Result<CatalogOutcome> {
    let report = read_validation_report(&config.validation_report_path())?;
    let entries = build_catalog(&report, config.separator_byte());
    let table = catalog_table(&entries);

    let csv_path = config.catalog_csv_path();
    write_table(&csv_path, &table, b',', true)?;

    let xlsx_path = config.catalog_xlsx_path();
    let xlsx_path = match write_workbook(&xlsx_path, &table, &[]) {
        Ok(()) => Some(xlsx_path),
        Err(err) => {
            warn!(file = %xlsx_path.display(), error = %err, "catalog spreadsheet not written");
            None
        }
    };

    let curated_path = config.curated_catalog_path();
    let sync = sync_curated(&table, &curated_path, &config.consolidation.dashboard_flag_column)?;

    let outcome = CatalogOutcome {
        entries: entries.len(),
        omitted: report.len() - entries.len(),
        csv_path,
        xlsx_path,
        curated_path,
        curated_added: sync.added,
        curated_removed: sync.removed,
    };
    info!(
        entries = outcome.entries,
        omitted = outcome.omitted,
        file = %outcome.csv_path.display(),
        "catalog written"
    );
    Ok(outcome)
}
