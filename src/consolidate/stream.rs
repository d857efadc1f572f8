//! Incremental writer for a consolidated base: processed theme files are read
//! one at a time, reshaped and appended to a single delimited file.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consolidate::long::{extra_dimensions, long_schema, to_long, value_columns, LongOptions};
use crate::error::{PipelineError, Result};
use crate::ingest::{parse_filename_parts, ValidationRow};
use crate::normalize::build_indicator_id;
use crate::table::{read_table, Table, UTF8_BOM};

const ID_COLUMN: &str = "indicador_id";

/// Every `.csv` under the processed root, in lexicographic path order.
pub fn discover_processed_files(csv_root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(csv_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();
    paths
}

/// Identity of the indicator a processed file belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorIdentity {
    pub id: String,
    pub category: String,
    pub source: String,
    pub theme: String,
}

/// Resolves a processed file to its indicator: the file's own id column
/// first, then the validation report entry for its path, then its location
/// (`<category>/<theme> - <source>.csv`).
#[derive(Debug, Clone, Default)]
pub struct IndicatorIndex {
    by_path: HashMap<PathBuf, IndicatorIdentity>,
}

impl IndicatorIndex {
    pub fn from_report(rows: &[ValidationRow]) -> Self {
        let by_path = rows
            .iter()
            .filter_map(|row| {
                let path = row.csv_path.clone()?;
                Some((
                    path,
                    IndicatorIdentity {
                        id: row.indicator_id.clone(),
                        category: row.category.clone(),
                        source: row.source.clone(),
                        theme: row.theme.clone(),
                    },
                ))
            })
            .collect();
        Self { by_path }
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn resolve(&self, csv_root: &Path, path: &Path, table: &Table) -> IndicatorIdentity {
        let mut identity = self
            .by_path
            .get(path)
            .cloned()
            .unwrap_or_else(|| identity_from_location(csv_root, path));

        let own_id = table
            .column_index(ID_COLUMN)
            .and_then(|index| table.column_values(index).find(|id| !id.trim().is_empty()));
        if let Some(own_id) = own_id {
            identity.id = own_id.trim().to_string();
        }
        identity
    }
}

fn identity_from_location(csv_root: &Path, path: &Path) -> IndicatorIdentity {
    let category = path
        .strip_prefix(csv_root)
        .ok()
        .and_then(|relative| {
            let mut components = relative.components();
            let first = components.next()?;
            components.next()?;
            Some(first.as_os_str().to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Export names are "<theme> - <source>"; reuse the raw-name grammar and swap.
    let parts = parse_filename_parts(&stem);
    let (theme, source) = if parts.theme == parts.source {
        (parts.source.clone(), parts.source)
    } else {
        (parts.source, parts.theme)
    };
    IndicatorIdentity {
        id: build_indicator_id(&category, &source, &theme),
        category,
        source,
        theme,
    }
}

/// Fill identity columns the processed file does not carry.
fn attach_identity(table: &mut Table, identity: &IndicatorIdentity) {
    for (column, value) in [
        (ID_COLUMN, identity.id.as_str()),
        ("categoria", identity.category.as_str()),
        ("fonte", identity.source.as_str()),
        ("tema", identity.theme.as_str()),
    ] {
        let filled = table
            .column_index(column)
            .is_some_and(|index| table.column_values(index).any(|v| !v.trim().is_empty()));
        if !filled {
            table.set_constant_column(column, value);
        }
    }
}

/// Per-output accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub rows_written: usize,
    pub files_read: usize,
    pub files_unreadable: usize,
    pub files_filtered: usize,
    pub files_without_values: usize,
}

/// Inputs shared by every base written in one run.
#[derive(Debug, Clone)]
pub struct StreamSource<'a> {
    pub csv_root: &'a Path,
    pub files: &'a [PathBuf],
    pub index: &'a IndicatorIndex,
    pub separator: u8,
}

impl StreamSource<'_> {
    /// Read, resolve and filter one file. `Err` carries the skip counter to bump.
    fn load(&self, path: &Path, filter: Option<&HashSet<String>>) -> std::result::Result<Table, Skip> {
        let mut table = match read_table(path, self.separator) {
            Ok(table) => table,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "processed file unreadable, skipped");
                return Err(Skip::Unreadable);
            }
        };
        let identity = self.index.resolve(self.csv_root, path, &table);
        if let Some(selected) = filter {
            if !selected.contains(&identity.id) {
                return Err(Skip::Filtered);
            }
        }
        attach_identity(&mut table, &identity);
        Ok(table)
    }

    /// Union of the extra dimensions of every selected file, first-seen order.
    fn scan_extra_dims(&self, filter: Option<&HashSet<String>>) -> Vec<String> {
        let mut dims: Vec<String> = Vec::new();
        for path in self.files {
            let Ok(table) = self.load(path, filter) else {
                continue;
            };
            let values = value_columns(&table);
            if values.is_empty() {
                continue;
            }
            for dim in extra_dimensions(&table, &values) {
                if !dims.contains(&dim) {
                    dims.push(dim);
                }
            }
        }
        dims
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Unreadable,
    Filtered,
}

/// Stream every selected file into `out_csv` with a fixed header.
///
/// When extra dimensions are requested, a first pass collects them so the
/// header is known before any row is written. The file is written even when
/// no row qualifies (header only).
pub fn stream_long_csv(
    source: &StreamSource<'_>,
    out_csv: &Path,
    options: LongOptions,
    filter: Option<&HashSet<String>>,
) -> Result<StreamStats> {
    let extra_dims = if options.extra_dims {
        source.scan_extra_dims(filter)
    } else {
        Vec::new()
    };
    let schema = long_schema(options, &extra_dims);

    if let Some(parent) = out_csv.parent() {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }
    let file = File::create(out_csv).map_err(|err| PipelineError::io(out_csv, err))?;
    let mut buffered = BufWriter::new(file);
    buffered
        .write_all(UTF8_BOM)
        .map_err(|err| PipelineError::io(out_csv, err))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(source.separator)
        .from_writer(buffered);
    writer
        .write_record(&schema)
        .map_err(|err| PipelineError::csv(out_csv, err))?;

    let mut stats = StreamStats::default();
    for path in source.files {
        let table = match source.load(path, filter) {
            Ok(table) => table,
            Err(Skip::Unreadable) => {
                stats.files_unreadable += 1;
                continue;
            }
            Err(Skip::Filtered) => {
                stats.files_filtered += 1;
                continue;
            }
        };
        stats.files_read += 1;

        let rows = to_long(&table, &schema, options.only_numeric);
        if rows.is_empty() {
            stats.files_without_values += 1;
            debug!(file = %path.display(), "no value rows");
            continue;
        }
        for row in &rows {
            writer
                .write_record(row)
                .map_err(|err| PipelineError::csv(out_csv, err))?;
        }
        stats.rows_written += rows.len();
        debug!(file = %path.display(), rows = rows.len(), "appended");
    }
    writer.flush().map_err(|err| PipelineError::io(out_csv, err))?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_gives_category_theme_and_source() {
        let identity = identity_from_location(
            Path::new("/p/csv"),
            Path::new("/p/csv/Socioeconomia/Renda per capita - IBGE.csv"),
        );
        assert_eq!(identity.category, "Socioeconomia");
        assert_eq!(identity.theme, "Renda per capita");
        assert_eq!(identity.source, "IBGE");
        assert_eq!(identity.id, "socioeconomia__ibge__renda_per_capita");
    }

    #[test]
    fn own_column_wins_over_report_and_location() {
        let row = ValidationRow {
            category: "C".into(),
            source: "S".into(),
            theme: "T".into(),
            indicator_id: "c__s__t".into(),
            status: crate::ingest::CoverageStatus::Ok,
            csv_path: Some(PathBuf::from("/p/csv/C/T - S.csv")),
            xlsx_path: None,
            rows: 1,
            columns: 1,
            missing_codes: Vec::new(),
            present: 1,
            expected: 1,
        };
        let index = IndicatorIndex::from_report(&[row]);
        let root = Path::new("/p/csv");
        let path = Path::new("/p/csv/C/T - S.csv");

        let plain = Table::new(vec!["cod_municipio".into()]);
        assert_eq!(index.resolve(root, path, &plain).id, "c__s__t");

        let mut own = Table::new(vec!["indicador_id".into()]);
        own.push_row(vec!["proprio".into()]);
        let identity = index.resolve(root, path, &own);
        assert_eq!(identity.id, "proprio");
        assert_eq!(identity.theme, "T");
    }

    #[test]
    fn identity_columns_fill_only_when_absent() {
        let mut table = Table::new(vec!["tema".into(), "area_ha".into()]);
        table.push_row(vec!["Proprio".into(), "1".into()]);
        let identity = IndicatorIdentity {
            id: "a__b__c".into(),
            category: "A".into(),
            source: "B".into(),
            theme: "C".into(),
        };
        attach_identity(&mut table, &identity);
        assert_eq!(table.cell(&table.rows[0], "tema"), "Proprio");
        assert_eq!(table.cell(&table.rows[0], "indicador_id"), "a__b__c");
        assert_eq!(table.cell(&table.rows[0], "fonte"), "B");
    }
}
