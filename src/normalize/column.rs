//! Raw column label -> canonical identifier.
//!
//! The synonym dictionary wins; otherwise the label is slugified and a trailing
//! parenthetical unit (`Área (ha)`) becomes a suffix (`area_ha`).

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use calamine::Reader;
use regex::Regex;

use crate::error::{PipelineError, Result};
use crate::normalize::slug::{slugify, unit_to_suffix};
use crate::table::read_delimited;

/// One row of the names dictionary (`canonical`, `label_pt`, `synonyms`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub canonical: String,
    pub label_pt: String,
    pub synonyms: Vec<String>,
}

impl DictionaryEntry {
    fn from_fields(canonical: &str, label_pt: &str, synonyms: &str) -> Self {
        Self {
            canonical: canonical.trim().to_string(),
            label_pt: label_pt.trim().to_string(),
            synonyms: synonyms.split('|').map(|s| s.trim().to_string()).collect(),
        }
    }
}

/// Slugged synonym -> canonical column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymDictionary {
    by_slug: HashMap<String, String>,
}

impl SynonymDictionary {
    pub fn from_entries(entries: impl IntoIterator<Item = DictionaryEntry>) -> Self {
        let mut dictionary = Self::default();
        for entry in entries {
            let aliases = entry.synonyms.iter().chain(std::iter::once(&entry.label_pt));
            for alias in aliases {
                dictionary.insert(alias, &entry.canonical);
            }
        }
        dictionary
    }

    pub fn insert(&mut self, synonym: &str, canonical: &str) {
        let key = slugify(synonym);
        if !key.is_empty() {
            self.by_slug.insert(key, canonical.to_string());
        }
    }

    pub fn lookup(&self, slug: &str) -> Option<&str> {
        self.by_slug.get(slug).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_slug.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slug.is_empty()
    }

    /// Load the dictionary from a delimited file or an `.xlsx` workbook (first sheet).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::missing("names dictionary", path));
        }
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        let entries = if is_workbook {
            read_workbook_entries(path)?
        } else {
            read_delimited_entries(path)?
        };
        Ok(Self::from_entries(entries))
    }
}

fn read_delimited_entries(path: &Path) -> Result<Vec<DictionaryEntry>> {
    let table = read_delimited(path)?;
    let canonical = table.column_index("canonical").ok_or_else(|| PipelineError::Malformed {
        path: path.to_path_buf(),
        message: "dictionary has no 'canonical' column".to_string(),
    })?;
    let label = table.column_index("label_pt");
    let synonyms = table.column_index("synonyms");

    Ok(table
        .rows
        .iter()
        .map(|row| {
            let cell = |index: Option<usize>| index.and_then(|i| row.get(i)).map_or("", String::as_str);
            DictionaryEntry::from_fields(cell(Some(canonical)), cell(label), cell(synonyms))
        })
        .collect())
}

fn read_workbook_entries(path: &Path) -> Result<Vec<DictionaryEntry>> {
    let spreadsheet_error = |message: String| PipelineError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = calamine::open_workbook_auto(path).map_err(|e| spreadsheet_error(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| spreadsheet_error("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let find = |name: &str| header.iter().position(|cell| cell_text(cell).eq_ignore_ascii_case(name));
    let canonical = find("canonical")
        .ok_or_else(|| spreadsheet_error("dictionary has no 'canonical' column".to_string()))?;
    let label = find("label_pt");
    let synonyms = find("synonyms");

    Ok(rows
        .map(|row| {
            let cell = |index: Option<usize>| index.and_then(|i| row.get(i)).map(cell_text).unwrap_or_default();
            DictionaryEntry::from_fields(&cell(Some(canonical)), &cell(label), &cell(synonyms))
        })
        .collect())
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn trailing_unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.*?)\s*[\(\[\{]([^\)\]\}]+)[\)\]\}]\s*$").expect("static pattern")
    })
}

/// Canonical identifier for a raw column label.
pub fn normalize_column_name(label: &str, dictionary: &SynonymDictionary) -> String {
    let label = label.trim();
    if label.is_empty() {
        return String::new();
    }

    let slug = slugify(label);
    if let Some(canonical) = dictionary.lookup(&slug) {
        return canonical.to_string();
    }

    let (base, unit_suffix) = match trailing_unit_pattern().captures(label) {
        Some(caps) => (
            caps.get(1).map_or("", |m| m.as_str()).trim(),
            unit_to_suffix(caps.get(2).map_or("", |m| m.as_str())),
        ),
        None => (label, String::new()),
    };

    let mut base_slug = slugify(base);
    if !unit_suffix.is_empty() && !base_slug.ends_with(&format!("_{unit_suffix}")) {
        base_slug = format!("{base_slug}_{unit_suffix}");
    }
    if base_slug.is_empty() {
        slug
    } else {
        base_slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> SynonymDictionary {
        SynonymDictionary::from_entries([DictionaryEntry {
            canonical: "cod_municipio".to_string(),
            label_pt: "Código do município".to_string(),
            synonyms: vec!["CD_MUN".to_string(), "geocodigo".to_string()],
        }])
    }

    #[test]
    fn dictionary_match_wins_over_heuristics() {
        let dict = dictionary();
        assert_eq!(normalize_column_name("CD_MUN", &dict), "cod_municipio");
        assert_eq!(normalize_column_name("Código do Município", &dict), "cod_municipio");
        assert_eq!(normalize_column_name("Geocódigo", &dict), "cod_municipio");
    }

    #[test]
    fn trailing_unit_becomes_suffix() {
        let dict = SynonymDictionary::default();
        assert_eq!(normalize_column_name("Área (ha)", &dict), "area_ha");
        assert_eq!(normalize_column_name("Taxa de pobreza (%)", &dict), "taxa_de_pobreza_perc");
        assert_eq!(normalize_column_name("Valor [R$/ha]", &dict), "valor_rs_por_ha");
        assert_eq!(normalize_column_name("Produção (toneladas)", &dict), "producao_toneladas");
    }

    #[test]
    fn suffix_is_not_duplicated() {
        let dict = SynonymDictionary::default();
        assert_eq!(normalize_column_name("area_ha (ha)", &dict), "area_ha");
    }

    #[test]
    fn plain_labels_are_slugified() {
        let dict = SynonymDictionary::default();
        assert_eq!(normalize_column_name("Ano", &dict), "ano");
        assert_eq!(normalize_column_name("População Total", &dict), "populacao_total");
        assert_eq!(normalize_column_name("   ", &dict), "");
    }
}
