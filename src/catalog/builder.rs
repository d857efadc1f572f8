use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::consolidate::value::parse_decimal;
use crate::ingest::ValidationRow;
use crate::normalize::unit_label_for_variable;
use crate::table::{read_column, read_headers, Table};

pub const CATALOG_COLUMNS: [&str; 10] = [
    "indicador_id",
    "categoria",
    "fonte",
    "tema",
    "unidade",
    "periodo",
    "arquivo_csv",
    "arquivo_excel",
    "n_variaveis",
    "variaveis",
];

/// Bookkeeping columns that never count as indicator variables.
pub const METADATA_COLUMNS: [&str; 11] = [
    "indicador_id",
    "categoria",
    "fonte",
    "tema",
    "recorte_origem",
    "arquivo_origem",
    "territorio_id",
    "territorio_nome",
    "cod_municipio",
    "ano",
    "mes",
];

pub const MULTIPLE_UNITS: &str = "multiplas";
pub const VARIABLE_LIST_LIMIT: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub indicator_id: String,
    pub category: String,
    pub source: String,
    pub theme: String,
    pub unit: String,
    pub period: String,
    pub csv_path: PathBuf,
    pub xlsx_path: Option<PathBuf>,
    pub variables: Vec<String>,
}

impl CatalogEntry {
    fn to_record(&self) -> Vec<String> {
        let listed: Vec<&str> = self
            .variables
            .iter()
            .take(VARIABLE_LIST_LIMIT)
            .map(String::as_str)
            .collect();
        vec![
            self.indicator_id.clone(),
            self.category.clone(),
            self.source.clone(),
            self.theme.clone(),
            self.unit.clone(),
            self.period.clone(),
            self.csv_path.to_string_lossy().into_owned(),
            self.xlsx_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            self.variables.len().to_string(),
            listed.join(", "),
        ]
    }
}

pub fn value_variables(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .filter(|header| !METADATA_COLUMNS.contains(&header.as_str()))
        .cloned()
        .collect()
}

/// Single known unit, [`MULTIPLE_UNITS`] when several, empty when none.
pub fn infer_unit(variables: &[String]) -> String {
    let units: BTreeSet<&str> = variables
        .iter()
        .filter_map(|variable| unit_label_for_variable(variable))
        .collect();
    match units.len() {
        0 => String::new(),
        1 => units.into_iter().next().unwrap_or_default().to_string(),
        _ => MULTIPLE_UNITS.to_string(),
    }
}

/// `"<min>-<max>"` over the year values that parse, empty when none do.
pub fn infer_period<S: AsRef<str>>(years: &[S]) -> String {
    let parsed: Vec<i64> = years
        .iter()
        .filter_map(|year| parse_decimal(year.as_ref()))
        .map(|year| year.trunc() as i64)
        .collect();
    match (parsed.iter().min(), parsed.iter().max()) {
        (Some(min), Some(max)) => format!("{min}-{max}"),
        _ => String::new(),
    }
}

/// Catalog entry for one report row; `None` when the processed file is
/// missing or its header cannot be read.
pub fn entry_for(row: &ValidationRow, separator: u8) -> Option<CatalogEntry> {
    let csv_path = row.csv_path.as_ref().filter(|path| path.is_file())?;
    let headers = match read_headers(csv_path, separator) {
        Ok(headers) => headers,
        Err(err) => {
            debug!(file = %csv_path.display(), error = %err, "catalog entry omitted");
            return None;
        }
    };
    let variables = value_variables(&headers);
    let period = read_column(csv_path, separator, "ano")
        .ok()
        .flatten()
        .map(|years| infer_period(&years))
        .unwrap_or_default();

    Some(CatalogEntry {
        indicator_id: row.indicator_id.clone(),
        category: row.category.clone(),
        source: row.source.clone(),
        theme: row.theme.clone(),
        unit: infer_unit(&variables),
        period,
        csv_path: csv_path.clone(),
        xlsx_path: row.xlsx_path.clone(),
        variables,
    })
}

/// One entry per readable processed file, sorted by category, source, theme.
pub fn build_catalog(report: &[ValidationRow], separator: u8) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = report
        .iter()
        .filter_map(|row| entry_for(row, separator))
        .collect();
    entries.sort_by(|a, b| {
        (&a.category, &a.source, &a.theme).cmp(&(&b.category, &b.source, &b.theme))
    });
    entries
}

pub fn catalog_table(entries: &[CatalogEntry]) -> Table {
    let mut table = Table::new(CATALOG_COLUMNS.iter().map(|c| c.to_string()).collect());
    for entry in entries {
        table.push_row(entry.to_record());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn metadata_columns_are_not_variables() {
        let headers = strings(&["territorio_id", "cod_municipio", "ano", "area_ha", "renda_rs"]);
        assert_eq!(value_variables(&headers), strings(&["area_ha", "renda_rs"]));
    }

    #[test]
    fn unit_is_single_multiple_or_empty() {
        assert_eq!(infer_unit(&strings(&["area_ha", "area_total_ha"])), "ha");
        assert_eq!(infer_unit(&strings(&["area_ha", "taxa_perc"])), "multiplas");
        assert_eq!(infer_unit(&strings(&["populacao", "indice"])), "");
        assert_eq!(infer_unit(&strings(&["area_km2", "nome"])), "km²");
    }

    #[test]
    fn period_spans_parsed_years() {
        assert_eq!(infer_period(&["2019", "2015", "", "n/d", "2021.0"]), "2015-2021");
        assert_eq!(infer_period(&["", "x"]), "");
        assert_eq!(infer_period::<&str>(&[]), "");
    }
}
