use std::path::PathBuf;

use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::FileFailure;
use crate::ingest::bucket::BucketKey;
use crate::normalize::safe_filename;
use crate::table::{write_table, write_workbook, Table};

/// Identity and time columns leading every theme export.
pub const LEADING_COLUMNS: [&str; 11] = [
    "indicador_id",
    "categoria",
    "fonte",
    "tema",
    "territorio_id",
    "territorio_nome",
    "cod_municipio",
    "ano",
    "mes",
    "arquivo_origem",
    "recorte_origem",
];

/// Already encoded in the output path, so not written to the file itself.
pub const DROPPED_EXPORT_COLUMNS: [&str; 4] = ["indicador_id", "categoria", "fonte", "tema"];

pub const CSV_FAILURE_PREFIX: &str = "csv_write_error:";
pub const XLSX_FAILURE_PREFIX: &str = "xlsx_write_error:";

/// Written as text in the workbook so every code keeps one cell type.
const WORKBOOK_TEXT_COLUMNS: [&str; 1] = ["cod_municipio"];

/// Output locations of one theme: `<root>/<category>/<theme> - <source>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePaths {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
}

impl ThemePaths {
    pub fn for_bucket(config: &PipelineConfig, key: &BucketKey) -> Self {
        let category_dir = safe_filename(&key.category);
        let base = safe_filename(&format!("{} - {}", key.theme, key.source));
        Self {
            csv: config
                .processed_csv_dir()
                .join(&category_dir)
                .join(format!("{base}.csv")),
            xlsx: config
                .processed_xlsx_dir()
                .join(&category_dir)
                .join(format!("{base}.xlsx")),
        }
    }
}

/// Column order and projection of the physical export.
pub fn shape_for_export(mut rows: Table) -> Table {
    rows.reorder_first(&LEADING_COLUMNS);
    rows.drop_columns(&DROPPED_EXPORT_COLUMNS);
    rows
}

/// What was actually written for one bucket; empty paths were not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedTheme {
    pub csv: Option<PathBuf>,
    pub xlsx: Option<PathBuf>,
    pub rows: usize,
    pub columns: usize,
}

/// Write the shaped table as CSV and XLSX, per configuration.
///
/// Write failures are recorded in `failures` and never abort the stage. A failed
/// CSV leaves `csv` empty; a failed workbook still reports its requested path.
pub fn export_theme(
    config: &PipelineConfig,
    key: &BucketKey,
    table: &Table,
    failures: &mut Vec<FileFailure>,
) -> ExportedTheme {
    let paths = ThemePaths::for_bucket(config, key);
    let mut exported = ExportedTheme {
        rows: table.len(),
        columns: table.width(),
        ..ExportedTheme::default()
    };

    if config.export_csv {
        match write_table(&paths.csv, table, config.separator_byte(), true) {
            Ok(()) => exported.csv = Some(paths.csv),
            Err(err) => {
                warn!(file = %paths.csv.display(), error = %err, "theme export failed");
                failures.push(FileFailure::new(
                    &paths.csv,
                    format!("{CSV_FAILURE_PREFIX} {err}"),
                ));
            }
        }
    }
    if config.export_xlsx {
        if let Err(err) = write_workbook(&paths.xlsx, table, &WORKBOOK_TEXT_COLUMNS) {
            warn!(file = %paths.xlsx.display(), error = %err, "spreadsheet export failed");
            failures.push(FileFailure::new(
                &paths.xlsx,
                format!("{XLSX_FAILURE_PREFIX} {err}"),
            ));
        }
        exported.xlsx = Some(paths.xlsx);
    }
    exported
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn export_shape_leads_with_identity_and_drops_path_metadata() {
        let mut table = Table::new(strings(&[
            "renda",
            "tema",
            "cod_municipio",
            "ano",
            "indicador_id",
            "territorio_id",
            "arquivo_origem",
        ]));
        table.push_row(strings(&["10", "Renda", "1500602", "2020", "x", "1", "a.csv"]));

        let shaped = shape_for_export(table);
        assert_eq!(
            shaped.headers,
            strings(&["territorio_id", "cod_municipio", "ano", "arquivo_origem", "renda"])
        );
        assert_eq!(shaped.rows[0], strings(&["1", "1500602", "2020", "a.csv", "10"]));
    }

    #[test]
    fn theme_paths_use_theme_then_source() {
        let config = PipelineConfig::for_project_dir("/proj");
        let key = BucketKey {
            category: "Uso/Solo".into(),
            source: "MapBiomas".into(),
            theme: "Cobertura: total".into(),
        };
        let paths = ThemePaths::for_bucket(&config, &key);
        assert!(paths
            .csv
            .ends_with("csv/Uso_Solo/Cobertura_ total - MapBiomas.csv"));
        assert!(paths
            .xlsx
            .ends_with("xlsx/Uso_Solo/Cobertura_ total - MapBiomas.xlsx"));
    }
}
