//! Stage 1: raw indicator files -> one processed table per (category, source,
//! theme), with a coverage report and the lists of skipped files.

pub mod bucket;
pub mod export;
pub mod filename;
pub mod reader;
pub mod report;

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{FileFailure, PipelineError, Result};
use crate::normalize::SynonymDictionary;
use crate::territory::TerritoryRegistry;

pub use bucket::{find_municipality_column, BucketKey, Buckets, FileRows, ThemeFilter, MUNICIPALITY_COLUMN};
pub use export::{export_theme, shape_for_export, ExportedTheme, ThemePaths};
pub use filename::{parse_filename_parts, FilenameParts};
pub use reader::{discover_raw_files, read_raw_table, RawFile};
pub use report::{read_validation_report, Coverage, CoverageStatus, ValidationRow};

/// Everything one ingestion run produced or skipped.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub files_found: usize,
    pub skipped_by_filter: usize,
    pub report: Vec<ValidationRow>,
    /// Unreadable raw files and failed spreadsheet exports.
    pub read_failures: Vec<FileFailure>,
    pub missing_municipality: Vec<PathBuf>,
}

impl IngestOutcome {
    fn count_status(&self, status: CoverageStatus) -> usize {
        self.report.iter().filter(|row| row.status == status).count()
    }

    pub fn exported(&self) -> usize {
        self.report
            .iter()
            .filter(|row| row.status != CoverageStatus::Empty)
            .count()
    }

    pub fn partial(&self) -> usize {
        self.count_status(CoverageStatus::Partial)
    }

    pub fn empty(&self) -> usize {
        self.count_status(CoverageStatus::Empty)
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Raw files found: {}", self.files_found)?;
        writeln!(f, "Skipped by filter: {}", self.skipped_by_filter)?;
        writeln!(
            f,
            "Themes exported: {} ({} partial, {} empty)",
            self.exported(),
            self.partial(),
            self.empty()
        )?;
        writeln!(f, "Read errors: {}", self.read_failures.len())?;
        write!(
            f,
            "Without municipality column: {}",
            self.missing_municipality.len()
        )
    }
}

/// Run ingestion end to end and write the report files.
///
/// Missing raw directory or dictionary aborts; any single-file problem is
/// recorded in the outcome and the run continues.
pub fn run_ingest(config: &PipelineConfig) -> Result<IngestOutcome> {
    if !config.raw_dir.is_dir() {
        return Err(PipelineError::missing("raw directory", &config.raw_dir));
    }
    let dictionary = SynonymDictionary::load(&config.dictionary_path)?;
    config.ensure_dirs()?;

    let registry = TerritoryRegistry::new(&config.territories);
    let filter = ThemeFilter::from_config(config);
    let files = discover_raw_files(&config.raw_dir);
    info!(
        root = %config.raw_dir.display(),
        files = files.len(),
        synonyms = dictionary.len(),
        municipalities = registry.len(),
        "ingestion started"
    );

    let mut outcome = IngestOutcome {
        files_found: files.len(),
        ..IngestOutcome::default()
    };
    let mut buckets = Buckets::default();

    for raw in &files {
        if !filter.accepts(&raw.category, &raw.parts.theme) {
            outcome.skipped_by_filter += 1;
            continue;
        }
        let table = match read_raw_table(raw, &dictionary) {
            Ok(table) => table,
            Err(reason) => {
                warn!(file = %raw.path.display(), %reason, "unreadable raw file skipped");
                outcome.read_failures.push(FileFailure::new(&raw.path, reason));
                continue;
            }
        };
        match bucket::select_member_rows(raw, table, &registry) {
            FileRows::NoMunicipalityColumn => {
                warn!(file = %raw.path.display(), "no municipality column, file skipped");
                outcome.missing_municipality.push(raw.path.clone());
            }
            FileRows::Selected(rows) => {
                debug!(file = %raw.path.display(), rows = rows.len(), "member rows selected");
                buckets.add(BucketKey::for_file(raw), rows);
            }
        }
    }

    for (key, rows) in buckets.into_tables() {
        let coverage = match rows.column_index(MUNICIPALITY_COLUMN) {
            Some(index) => Coverage::assess(rows.column_values(index), &registry),
            None => Coverage::assess(std::iter::empty(), &registry),
        };
        let status = coverage.status();

        let exported = if status == CoverageStatus::Empty {
            ExportedTheme::default()
        } else {
            export_theme(config, &key, &shape_for_export(rows), &mut outcome.read_failures)
        };
        let is_partial = status == CoverageStatus::Partial;
        if is_partial {
            info!(
                bucket = %key.indicator_id(),
                missing = coverage.missing.len(),
                "partial territorial coverage"
            );
        }
        debug!(bucket = %key.indicator_id(), %status, rows = exported.rows, "bucket done");

        outcome.report.push(ValidationRow {
            indicator_id: key.indicator_id(),
            category: key.category,
            source: key.source,
            theme: key.theme,
            status,
            csv_path: exported.csv,
            xlsx_path: exported.xlsx,
            rows: exported.rows,
            columns: exported.columns,
            missing_codes: if is_partial { coverage.missing } else { Vec::new() },
            present: coverage.present,
            expected: coverage.expected,
        });
    }

    report::write_validation_report(&config.validation_report_path(), &outcome.report)?;
    report::write_read_errors(&config.read_errors_report_path(), &outcome.read_failures)?;
    report::write_missing_municipality(
        &config.missing_municipality_report_path(),
        &outcome.missing_municipality,
    )?;

    info!(
        buckets = outcome.report.len(),
        exported = outcome.exported(),
        partial = outcome.partial(),
        errors = outcome.read_failures.len(),
        without_municipality = outcome.missing_municipality.len(),
        skipped_by_filter = outcome.skipped_by_filter,
        "ingestion finished"
    );
    Ok(outcome)
}
