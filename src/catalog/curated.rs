//! Curated catalog: the fresh catalog plus human-maintained columns (the
//! dashboard flag and any notes), carried across regenerations by indicator id.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::table::{read_delimited, write_table, Table};

pub const ID_COLUMN: &str = "indicador_id";

/// Accepted (case-insensitive) spellings of "yes" for the inclusion flag.
pub const TRUTHY_TOKENS: [&str; 7] = ["1", "true", "t", "yes", "y", "sim", "s"];

pub fn is_truthy(raw: &str) -> bool {
    let token = raw.trim().to_lowercase();
    TRUTHY_TOKENS.contains(&token.as_str())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The curated file did not exist (or had no rows) and was initialised.
    pub created: bool,
    pub added: usize,
    pub removed: usize,
    pub rows: usize,
}

/// `None` when the file is absent or has no data rows.
pub fn read_curated(path: &Path) -> Result<Option<Table>> {
    if !path.is_file() {
        return Ok(None);
    }
    let table = read_delimited(path)?;
    Ok((!table.is_empty()).then_some(table))
}

fn ids(table: &Table) -> HashSet<&str> {
    table
        .column_index(ID_COLUMN)
        .map(|index| {
            table
                .column_values(index)
                .filter(|id| !id.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Merge the fresh catalog with the curated overlay.
///
/// Output rows follow the catalog. Manual columns are the flag plus every
/// curated column the catalog does not have; ids no longer in the catalog
/// are dropped together with their annotations.
pub fn merge_curated(catalog: &Table, curated: &Table, flag_column: &str, path: &Path) -> Result<Table> {
    let curated_id = curated
        .column_index(ID_COLUMN)
        .ok_or_else(|| PipelineError::MalformedCurated {
            path: path.to_path_buf(),
            column: ID_COLUMN.to_string(),
        })?;
    let catalog_id = catalog.column_index(ID_COLUMN);

    let mut manual: Vec<&str> = Vec::new();
    if !catalog.has_column(flag_column) {
        manual.push(flag_column);
    }
    for header in &curated.headers {
        let name = header.as_str();
        if name != ID_COLUMN && name != flag_column && !catalog.has_column(name) {
            manual.push(name);
        }
    }
    let manual_sources: Vec<Option<usize>> = manual
        .iter()
        .map(|name| curated.column_index(name))
        .collect();

    let mut by_id: HashMap<&str, &Vec<String>> = HashMap::new();
    for row in &curated.rows {
        by_id.entry(row[curated_id].as_str()).or_insert(row);
    }

    let mut headers = catalog.headers.clone();
    headers.extend(manual.iter().map(|name| name.to_string()));
    let mut merged = Table::new(headers);
    for row in &catalog.rows {
        let id = catalog_id.map_or("", |index| row[index].as_str());
        let overlay = by_id.get(id);
        let mut out = row.clone();
        for source in &manual_sources {
            let value = match (overlay, source) {
                (Some(curated_row), Some(index)) => curated_row[*index].clone(),
                _ => String::new(),
            };
            out.push(value);
        }
        merged.push_row(out);
    }
    Ok(merged)
}

/// Bring the curated file in line with `catalog`, creating it when absent.
/// Running it twice on the same catalog leaves the file byte-identical.
pub fn sync_curated(catalog: &Table, path: &Path, flag_column: &str) -> Result<SyncOutcome> {
    let (merged, outcome) = match read_curated(path)? {
        None => {
            let mut fresh = catalog.clone();
            if !fresh.has_column(flag_column) {
                fresh.set_constant_column(flag_column, "");
            }
            let outcome = SyncOutcome {
                created: true,
                added: ids(catalog).len(),
                removed: 0,
                rows: fresh.len(),
            };
            (fresh, outcome)
        }
        Some(curated) => {
            let merged = merge_curated(catalog, &curated, flag_column, path)?;
            let fresh_ids = ids(catalog);
            let curated_ids = ids(&curated);
            let outcome = SyncOutcome {
                created: false,
                added: fresh_ids.difference(&curated_ids).count(),
                removed: curated_ids.difference(&fresh_ids).count(),
                rows: merged.len(),
            };
            (merged, outcome)
        }
    };

    write_table(path, &merged, b',', true)?;
    info!(
        file = %path.display(),
        created = outcome.created,
        added = outcome.added,
        removed = outcome.removed,
        "curated catalog synchronized"
    );
    Ok(outcome)
}

/// Ids flagged for the dashboard, unique, in file order.
pub fn flagged_ids(curated: &Table, flag_column: &str) -> Vec<String> {
    let (Some(id_index), Some(flag_index)) =
        (curated.column_index(ID_COLUMN), curated.column_index(flag_column))
    else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    curated
        .rows
        .iter()
        .filter(|row| is_truthy(&row[flag_index]))
        .map(|row| row[id_index].trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
