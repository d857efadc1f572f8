//! Row selection and grouping: locate the municipality column, keep territory
//! members only, tag rows with their provenance and group them per theme.

use std::collections::{BTreeMap, HashSet};

use crate::config::PipelineConfig;
use crate::ingest::reader::RawFile;
use crate::normalize::{build_indicator_id, normalize_geocode, slugify};
use crate::table::Table;
use crate::territory::TerritoryRegistry;

pub const MUNICIPALITY_COLUMN: &str = "cod_municipio";

/// Known municipality-code column names, highest priority first.
const MUNICIPALITY_CANDIDATES: [&str; 9] = [
    "cod_municipio",
    "codigo_do_municipio",
    "código_do_município",
    "codigo_municipio",
    "código_municipio",
    "cd_mun",
    "geocod_ibge",
    "geocod_ibge_7",
    "id_municipio",
];

/// Index of the municipality-code column: a known name (case-insensitive),
/// else the first column mentioning both a municipality and a code.
pub fn find_municipality_column(headers: &[String]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    for candidate in MUNICIPALITY_CANDIDATES {
        if let Some(index) = lowered.iter().position(|h| h == candidate) {
            return Some(index);
        }
    }
    lowered
        .iter()
        .position(|h| h.contains("municip") && (h.contains("cod") || h.contains("geocod")))
}

/// Bucket identity. Ordering gives the deterministic export order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub category: String,
    pub source: String,
    pub theme: String,
}

impl BucketKey {
    pub fn for_file(raw: &RawFile) -> Self {
        Self {
            category: raw.category.clone(),
            source: raw.parts.source.clone(),
            theme: raw.parts.theme.clone(),
        }
    }

    pub fn indicator_id(&self) -> String {
        build_indicator_id(&self.category, &self.source, &self.theme)
    }
}

/// Optional category/theme allow-lists, compared by slug.
#[derive(Debug, Clone, Default)]
pub struct ThemeFilter {
    categories: HashSet<String>,
    themes: HashSet<String>,
}

impl ThemeFilter {
    pub fn new(categories: &[String], themes: &[String]) -> Self {
        Self {
            categories: categories.iter().map(|c| slugify(c)).collect(),
            themes: themes.iter().map(|t| slugify(t)).collect(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.category_filter, &config.theme_filter)
    }

    pub fn accepts(&self, category: &str, theme: &str) -> bool {
        (self.categories.is_empty() || self.categories.contains(&slugify(category)))
            && (self.themes.is_empty() || self.themes.contains(&slugify(theme)))
    }
}

/// Result of selecting the rows of one parsed raw file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileRows {
    /// Member rows, tagged and ready for the bucket (possibly zero rows).
    Selected(Table),
    NoMunicipalityColumn,
}

/// Normalize codes, keep territory members and tag every surviving row.
pub fn select_member_rows(raw: &RawFile, mut table: Table, registry: &TerritoryRegistry) -> FileRows {
    let Some(code_index) = find_municipality_column(&table.headers) else {
        return FileRows::NoMunicipalityColumn;
    };
    table.headers[code_index] = MUNICIPALITY_COLUMN.to_string();

    for row in &mut table.rows {
        row[code_index] = normalize_geocode(row[code_index].as_str());
    }
    table.retain_rows(|row| registry.contains(&row[code_index]));

    let key = BucketKey::for_file(raw);
    table.set_constant_column("indicador_id", &key.indicator_id());
    table.set_constant_column("categoria", &key.category);
    table.set_constant_column("fonte", &key.source);
    table.set_constant_column("tema", &key.theme);
    table.set_constant_column("recorte_origem", &raw.parts.scope);
    table.set_constant_column("arquivo_origem", &raw.file_name);
    table.set_column_with("territorio_id", |row| {
        registry
            .lookup(&row[code_index])
            .map(|t| t.id.to_string())
            .unwrap_or_default()
    });
    table.set_column_with("territorio_nome", |row| {
        registry
            .lookup(&row[code_index])
            .map(|t| t.name.clone())
            .unwrap_or_default()
    });
    FileRows::Selected(table)
}

/// Accumulated member rows per (category, source, theme).
#[derive(Debug, Default)]
pub struct Buckets {
    groups: BTreeMap<BucketKey, Vec<Table>>,
}

impl Buckets {
    /// Register the key even when `rows` is empty so the bucket is reported.
    pub fn add(&mut self, key: BucketKey, rows: Table) {
        let tables = self.groups.entry(key).or_default();
        if !rows.is_empty() {
            tables.push(rows);
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drain into concatenated tables, in key order.
    pub fn into_tables(self) -> impl Iterator<Item = (BucketKey, Table)> {
        self.groups
            .into_iter()
            .map(|(key, tables)| (key, Table::concat(tables)))
    }
}
