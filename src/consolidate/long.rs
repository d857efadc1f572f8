//! Wide-to-long reshaping of one processed theme table.

use crate::catalog::builder::METADATA_COLUMNS;
use crate::config::{BaseKind, ConsolidationConfig};
use crate::consolidate::value::{format_number, is_value_column, parse_integer, Notation};
use crate::normalize::{normalize_geocode, unit_label_for_variable};
use crate::table::Table;

pub const VARIABLE_COLUMN: &str = "variavel";
pub const NUMERIC_COLUMN: &str = "valor_num";
pub const RAW_VALUE_COLUMN: &str = "valor_raw";
pub const UNIT_COLUMN: &str = "unidade";

/// Leading columns of every consolidated base.
pub const LONG_LEADING_COLUMNS: [&str; 8] = [
    "territorio_id",
    "cod_municipio",
    "ano",
    "mes",
    "indicador_id",
    VARIABLE_COLUMN,
    NUMERIC_COLUMN,
    UNIT_COLUMN,
];

/// Text repeated on every row of a theme; kept only when not shrinking output.
pub const REPEATED_TEXT_COLUMNS: [&str; 6] = [
    "territorio_nome",
    "tema",
    "categoria",
    "fonte",
    "recorte_origem",
    "arquivo_origem",
];

const INTEGER_COLUMNS: [&str; 3] = ["ano", "mes", "territorio_id"];
const RESERVED_COLUMNS: [&str; 5] = [VARIABLE_COLUMN, "valor", RAW_VALUE_COLUMN, NUMERIC_COLUMN, UNIT_COLUMN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongOptions {
    /// Pivot on every extra non-value column as an additional dimension.
    pub extra_dims: bool,
    pub only_numeric: bool,
    pub drop_repeated_text: bool,
}

impl LongOptions {
    pub fn for_kind(config: &ConsolidationConfig, kind: BaseKind) -> Self {
        let rich = kind.is_rich();
        Self {
            extra_dims: rich && config.rich_include_extra_dims,
            only_numeric: config.only_numeric_rows,
            drop_repeated_text: config.drop_repeated_text && !(rich && config.rich_keep_text_columns),
        }
    }
}

/// Indices of the columns holding indicator values.
pub fn value_columns(table: &Table) -> Vec<usize> {
    (0..table.width())
        .filter(|&index| !METADATA_COLUMNS.contains(&table.headers[index].as_str()))
        .filter(|&index| is_value_column(table.column_values(index)))
        .collect()
}

/// Extra dimension columns: neither metadata nor value nor reserved, and not
/// an unnamed spreadsheet leftover.
pub fn extra_dimensions(table: &Table, values: &[usize]) -> Vec<String> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(index, _)| !values.contains(index))
        .map(|(_, header)| header)
        .filter(|header| {
            let name = header.trim();
            !name.is_empty()
                && !METADATA_COLUMNS.contains(&name)
                && !RESERVED_COLUMNS.contains(&name)
                && !name.to_lowercase().starts_with("unnamed")
        })
        .cloned()
        .collect()
}

/// Output columns for a base: the leading block, then repeated text, extra
/// dimensions and the raw value when they are kept.
pub fn long_schema(options: LongOptions, extra_dims: &[String]) -> Vec<String> {
    let mut schema: Vec<String> = LONG_LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
    if !options.drop_repeated_text {
        schema.extend(REPEATED_TEXT_COLUMNS.iter().map(|c| c.to_string()));
    }
    if options.extra_dims {
        let extras: Vec<String> = extra_dims
            .iter()
            .filter(|dim| !schema.contains(*dim))
            .cloned()
            .collect();
        schema.extend(extras);
    }
    if !options.drop_repeated_text {
        schema.push(RAW_VALUE_COLUMN.to_string());
    }
    schema
}

fn key_cell(name: &str, raw: &str) -> String {
    if INTEGER_COLUMNS.contains(&name) {
        parse_integer(raw).map(|v| v.to_string()).unwrap_or_default()
    } else if name == "cod_municipio" {
        normalize_geocode(raw)
    } else {
        raw.to_string()
    }
}

/// Reshape `table` into rows aligned with `schema`, one per (row, value column).
///
/// Rows are grouped by value column in header order and keep the input row
/// order within each group. An empty result means the table had no value
/// column or, under the numeric-only policy, no parsable value.
pub fn to_long(table: &Table, schema: &[String], only_numeric: bool) -> Vec<Vec<String>> {
    let values = value_columns(table);
    let sources: Vec<Option<usize>> = schema.iter().map(|name| table.column_index(name)).collect();

    let mut out = Vec::new();
    for &value_index in &values {
        let variable = table.headers[value_index].as_str();
        let unit = unit_label_for_variable(variable).unwrap_or_default();
        let notation = Notation::detect(table.column_values(value_index));
        for row in &table.rows {
            let raw = row[value_index].as_str();
            let number = notation.parse(raw);
            if only_numeric && number.is_none() {
                continue;
            }
            let record = schema
                .iter()
                .zip(&sources)
                .map(|(name, source)| match name.as_str() {
                    VARIABLE_COLUMN => variable.to_string(),
                    NUMERIC_COLUMN => number.map(format_number).unwrap_or_default(),
                    UNIT_COLUMN => unit.to_string(),
                    RAW_VALUE_COLUMN => raw.to_string(),
                    other => source
                        .map(|index| key_cell(other, &row[index]))
                        .unwrap_or_default(),
                })
                .collect();
            out.push(record);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let mut table = Table::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        table
    }

    fn lean() -> LongOptions {
        LongOptions {
            extra_dims: false,
            only_numeric: true,
            drop_repeated_text: true,
        }
    }

    #[test]
    fn options_follow_kind() {
        let config = ConsolidationConfig::default();
        let full = LongOptions::for_kind(&config, BaseKind::Full);
        assert!(full.drop_repeated_text && !full.extra_dims);
        let rich = LongOptions::for_kind(&config, BaseKind::DashboardRich);
        assert!(!rich.drop_repeated_text && rich.extra_dims);
    }

    #[test]
    fn reshape_lean_base_with_numeric_only_policy() {
        let wide = table(
            &["territorio_id", "cod_municipio", "ano", "produto", "area_ha", "renda_rs"],
            &[
                &["1", "1500602", "2020.0", "soja", "1.234,56", "10"],
                &["1", "1500701", "2020", "milho", "", "20"],
            ],
        );
        let schema = long_schema(lean(), &[]);
        let rows = to_long(&wide, &schema, true);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            vec!["1", "1500602", "2020", "", "", "area_ha", "1234.56", "ha"]
        );
        assert_eq!(rows[1][5], "renda_rs");
        assert_eq!(rows[1][7], "R$");
        assert_eq!(rows[2][1], "1500701");
        assert_eq!(rows[2][6], "20");
    }

    #[test]
    fn unparsed_values_are_kept_without_numeric_policy() {
        let wide = table(&["cod_municipio", "area_ha"], &[&["1500602", "1"], &["1500701", "x"], &["1500800", "2"]]);
        let schema = long_schema(lean(), &[]);
        let rows = to_long(&wide, &schema, false);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][6], "");
    }

    #[test]
    fn numeric_policy_drops_text_values() {
        let wide = table(&["cod_municipio", "area_ha"], &[&["1500602", "1"], &["1500701", "x"], &["1500800", "2"]]);
        let schema = long_schema(lean(), &[]);
        let rows = to_long(&wide, &schema, true);
        assert_eq!(rows.len(), 2);
        let codes: Vec<&str> = rows.iter().map(|row| row[1].as_str()).collect();
        assert_eq!(codes, vec!["1500602", "1500800"]);
        assert!(rows.iter().all(|row| !row[6].is_empty()));
    }

    #[test]
    fn thousand_groups_agree_within_a_value_column() {
        let wide = table(
            &["cod_municipio", "populacao"],
            &[&["1500602", "12.345"], &["1500701", "1.234.567"], &["1500800", "2.000"]],
        );
        let schema = long_schema(lean(), &[]);
        let rows = to_long(&wide, &schema, true);
        let numbers: Vec<&str> = rows.iter().map(|row| row[6].as_str()).collect();
        assert_eq!(numbers, vec!["12345", "1234567", "2000"]);
    }

    #[test]
    fn rich_schema_carries_extra_dimensions_and_text() {
        let wide = table(
            &["cod_municipio", "ano", "Unnamed: 0", "produto", "area_ha", "arquivo_origem"],
            &[&["1500602", "2020", "0", "soja", "5", "a.csv"]],
        );
        let values = value_columns(&wide);
        assert_eq!(values, vec![2, 4]);
        let dims = extra_dimensions(&wide, &values);
        assert_eq!(dims, vec!["produto"]);

        let options = LongOptions {
            extra_dims: true,
            only_numeric: true,
            drop_repeated_text: false,
        };
        let schema = long_schema(options, &dims);
        assert_eq!(&schema[8..], &[
            "territorio_nome", "tema", "categoria", "fonte", "recorte_origem", "arquivo_origem",
            "produto", "valor_raw",
        ]);
        let rows = to_long(&wide, &schema, true);
        let area = rows.iter().find(|r| r[5] == "area_ha").expect("area row");
        assert_eq!(area[13], "a.csv");
        assert_eq!(area[14], "soja");
        assert_eq!(area[15], "5");
    }

    #[test]
    fn table_without_values_yields_nothing() {
        let wide = table(&["cod_municipio", "nome"], &[&["1500602", "Altamira"]]);
        assert!(to_long(&wide, &long_schema(lean(), &[]), true).is_empty());
    }
}
