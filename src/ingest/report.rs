//! Validation report: one row per bucket with its coverage status, plus the
//! two failure lists (unreadable files, files without a municipality column).

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{FileFailure, PipelineError, Result};
use crate::table::{read_delimited, write_table, Table};
use crate::territory::TerritoryRegistry;

pub const REPORT_COLUMNS: [&str; 12] = [
    "categoria",
    "fonte",
    "tema",
    "indicador_id",
    "status",
    "arquivo_csv",
    "arquivo_excel",
    "linhas",
    "n_colunas",
    "faltando_cod_municipio",
    "municipios_presentes",
    "municipios_esperados",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStatus {
    Ok,
    Partial,
    Empty,
}

impl CoverageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "parcial",
            Self::Empty => "vazio",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "ok" => Some(Self::Ok),
            "parcial" => Some(Self::Partial),
            "vazio" => Some(Self::Empty),
            _ => None,
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Member codes present in a bucket against the full registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub present: usize,
    pub expected: usize,
    pub missing: Vec<String>,
}

impl Coverage {
    pub fn assess<'a>(codes: impl IntoIterator<Item = &'a str>, registry: &TerritoryRegistry) -> Self {
        let present: BTreeSet<&str> = codes
            .into_iter()
            .filter(|code| registry.contains(code))
            .collect();
        let missing = registry
            .members()
            .iter()
            .filter(|code| !present.contains(code.as_str()))
            .cloned()
            .collect();
        Self {
            present: present.len(),
            expected: registry.len(),
            missing,
        }
    }

    pub fn status(&self) -> CoverageStatus {
        if self.present == 0 {
            CoverageStatus::Empty
        } else if self.missing.is_empty() {
            CoverageStatus::Ok
        } else {
            CoverageStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRow {
    pub category: String,
    pub source: String,
    pub theme: String,
    pub indicator_id: String,
    pub status: CoverageStatus,
    pub csv_path: Option<PathBuf>,
    pub xlsx_path: Option<PathBuf>,
    pub rows: usize,
    pub columns: usize,
    pub missing_codes: Vec<String>,
    pub present: usize,
    pub expected: usize,
}

fn path_cell(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty_path(cell: &str) -> Option<PathBuf> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| PathBuf::from(cell))
}

impl ValidationRow {
    fn to_record(&self) -> Vec<String> {
        vec![
            self.category.clone(),
            self.source.clone(),
            self.theme.clone(),
            self.indicator_id.clone(),
            self.status.to_string(),
            path_cell(&self.csv_path),
            path_cell(&self.xlsx_path),
            self.rows.to_string(),
            self.columns.to_string(),
            self.missing_codes.join(","),
            self.present.to_string(),
            self.expected.to_string(),
        ]
    }

    fn from_record(table: &Table, row: &[String]) -> Option<Self> {
        let cell = |name: &str| table.cell(row, name).trim();
        let count = |name: &str| cell(name).parse::<usize>().unwrap_or(0);
        Some(Self {
            category: cell("categoria").to_string(),
            source: cell("fonte").to_string(),
            theme: cell("tema").to_string(),
            indicator_id: cell("indicador_id").to_string(),
            status: CoverageStatus::parse(cell("status"))?,
            csv_path: non_empty_path(cell("arquivo_csv")),
            xlsx_path: non_empty_path(cell("arquivo_excel")),
            rows: count("linhas"),
            columns: count("n_colunas"),
            missing_codes: cell("faltando_cod_municipio")
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect(),
            present: count("municipios_presentes"),
            expected: count("municipios_esperados"),
        })
    }
}

/// Sorted by category, source, theme; comma separated with a BOM.
pub fn write_validation_report(path: &Path, rows: &[ValidationRow]) -> Result<()> {
    let mut sorted: Vec<&ValidationRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.category, &a.source, &a.theme).cmp(&(&b.category, &b.source, &b.theme))
    });

    let mut table = Table::new(REPORT_COLUMNS.iter().map(|c| c.to_string()).collect());
    for row in sorted {
        table.push_row(row.to_record());
    }
    write_table(path, &table, b',', true)
}

/// Rows with an unknown status are skipped.
pub fn read_validation_report(path: &Path) -> Result<Vec<ValidationRow>> {
    if !path.is_file() {
        return Err(PipelineError::missing("validation report", path));
    }
    let table = read_delimited(path)?;
    if !table.has_column("arquivo_csv") {
        return Err(PipelineError::Malformed {
            path: path.to_path_buf(),
            message: "validation report has no 'arquivo_csv' column".to_string(),
        });
    }
    Ok(table
        .rows
        .iter()
        .filter_map(|row| ValidationRow::from_record(&table, row))
        .collect())
}

/// `arquivo,erro` list of files that could not be read or exported.
pub fn write_read_errors(path: &Path, failures: &[FileFailure]) -> Result<()> {
    let mut table = Table::new(vec!["arquivo".to_string(), "erro".to_string()]);
    for failure in failures {
        table.push_row(vec![
            failure.path.to_string_lossy().into_owned(),
            failure.reason.clone(),
        ]);
    }
    write_table(path, &table, b',', true)
}

/// `arquivo` list of files without an identifiable municipality column.
pub fn write_missing_municipality(path: &Path, files: &[PathBuf]) -> Result<()> {
    let mut table = Table::new(vec!["arquivo".to_string()]);
    for file in files {
        table.push_row(vec![file.to_string_lossy().into_owned()]);
    }
    write_table(path, &table, b',', true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::territory::TerritoryDefinition;

    fn registry() -> TerritoryRegistry {
        TerritoryRegistry::new(&[
            TerritoryDefinition::new(1, "A", &["1500107", "1500206", "1500305", "1500404"]),
            TerritoryDefinition::new(2, "B", &["1500503", "1500602", "1500701", "1500800"]),
        ])
    }

    #[test]
    fn full_coverage_is_ok() {
        let reg = registry();
        let codes: Vec<String> = reg.members().iter().cloned().collect();
        let coverage = Coverage::assess(codes.iter().map(String::as_str), &reg);
        assert_eq!(coverage.status(), CoverageStatus::Ok);
        assert_eq!((coverage.present, coverage.expected), (8, 8));
    }

    #[test]
    fn partial_coverage_lists_missing_codes() {
        let reg = registry();
        let present = ["1500107", "1500206", "1500305", "1500404", "1500503", "1500602", "1500602"];
        let coverage = Coverage::assess(present, &reg);
        assert_eq!(coverage.status(), CoverageStatus::Partial);
        assert_eq!(coverage.present, 6);
        assert_eq!(coverage.missing, vec!["1500701", "1500800"]);
    }

    #[test]
    fn no_rows_is_empty() {
        let coverage = Coverage::assess(std::iter::empty(), &registry());
        assert_eq!(coverage.status(), CoverageStatus::Empty);
        assert_eq!(coverage.missing.len(), 8);
    }

    #[test]
    fn report_is_sorted_and_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("_relatorio_validacao.csv");
        let row = |category: &str, theme: &str| ValidationRow {
            category: category.into(),
            source: "IBGE".into(),
            theme: theme.into(),
            indicator_id: format!("{category}__ibge__{theme}"),
            status: CoverageStatus::Partial,
            csv_path: Some(dir.path().join(format!("{theme}, IBGE.csv"))),
            xlsx_path: None,
            rows: 12,
            columns: 5,
            missing_codes: vec!["1500701".into(), "1500800".into()],
            present: 6,
            expected: 8,
        };
        write_validation_report(&path, &[row("b", "t"), row("a", "z")]).expect("write");

        let rows = read_validation_report(&path).expect("read");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], row("a", "z"));
        assert_eq!(rows[1].category, "b");
    }

    #[test]
    fn missing_report_is_a_precondition_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_validation_report(&dir.path().join("none.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }
}
