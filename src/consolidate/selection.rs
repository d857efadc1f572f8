use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::catalog::curated::{flagged_ids, read_curated, ID_COLUMN};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::table::read_delimited;

/// Why the dashboard set is what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// Rows flagged in the curated catalog.
    Curated,
    /// Curated file present, nothing flagged, fallback disabled.
    NothingFlagged,
    /// First ids of the catalog, up to the configured cap.
    CatalogFallback,
    /// No curated flags and no usable catalog.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSelection {
    pub source: SelectionSource,
    pub ids: Vec<String>,
}

impl DashboardSelection {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id_set(&self) -> HashSet<String> {
        self.ids.iter().cloned().collect()
    }
}

fn catalog_head(path: &Path, limit: usize) -> Result<Vec<String>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let catalog = read_delimited(path)?;
    let Some(index) = catalog.column_index(ID_COLUMN) else {
        return Ok(Vec::new());
    };
    let mut seen = HashSet::new();
    Ok(catalog
        .column_values(index)
        .map(str::trim)
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .take(limit)
        .map(str::to_string)
        .collect())
}

/// Decide which indicator ids feed the dashboard bases.
///
/// Flagged curated rows always win. With nothing flagged, an existing curated
/// file and a disabled fallback yield an empty set. Otherwise, and always when
/// the curated file is absent, the first ids of the catalog are taken.
pub fn select_dashboard_ids(config: &PipelineConfig) -> Result<DashboardSelection> {
    let settings = &config.consolidation;
    let flag = settings.dashboard_flag_column.as_str();

    if let Some(curated) = read_curated(&config.curated_catalog_path())? {
        let ids = if curated.has_column(flag) {
            flagged_ids(&curated, flag)
        } else {
            Vec::new()
        };
        if !ids.is_empty() {
            return Ok(DashboardSelection {
                source: SelectionSource::Curated,
                ids,
            });
        }
        if !settings.dashboard_use_fallback {
            return Ok(DashboardSelection {
                source: SelectionSource::NothingFlagged,
                ids: Vec::new(),
            });
        }
    }

    let ids = catalog_head(&config.catalog_csv_path(), settings.dashboard_fallback_max)?;
    if ids.is_empty() {
        return Ok(DashboardSelection {
            source: SelectionSource::Unavailable,
            ids,
        });
    }
    Ok(DashboardSelection {
        source: SelectionSource::CatalogFallback,
        ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_in(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::for_project_dir(dir);
        config.outputs_dir = dir.join("outputs");
        fs::create_dir_all(&config.outputs_dir).expect("outputs dir");
        fs::write(
            config.catalog_csv_path(),
            "indicador_id,tema\na,A\nb,B\nb,B2\nc,C\nd,D\n",
        )
        .expect("catalog");
        config
    }

    #[test]
    fn flagged_rows_win_regardless_of_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        fs::write(
            config.curated_catalog_path(),
            "indicador_id,dashboard\na,sim\nb,\nc,S\nd,1\n",
        )
        .expect("curated");

        for fallback in [true, false] {
            config.consolidation.dashboard_use_fallback = fallback;
            let selection = select_dashboard_ids(&config).expect("select");
            assert_eq!(selection.source, SelectionSource::Curated);
            assert_eq!(selection.ids, vec!["a", "c", "d"]);
        }
    }

    #[test]
    fn nothing_flagged_without_fallback_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        fs::write(config.curated_catalog_path(), "indicador_id,dashboard\na,nao\nb,\n").expect("curated");
        config.consolidation.dashboard_use_fallback = false;

        let selection = select_dashboard_ids(&config).expect("select");
        assert_eq!(selection.source, SelectionSource::NothingFlagged);
        assert!(selection.is_empty());
    }

    #[test]
    fn fallback_takes_unique_catalog_head() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.consolidation.dashboard_fallback_max = 3;

        let selection = select_dashboard_ids(&config).expect("select");
        assert_eq!(selection.source, SelectionSource::CatalogFallback);
        assert_eq!(selection.ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn absent_curated_file_takes_catalog_head_even_without_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.consolidation.dashboard_use_fallback = false;
        assert!(!config.curated_catalog_path().exists());

        let selection = select_dashboard_ids(&config).expect("select");
        assert_eq!(selection.source, SelectionSource::CatalogFallback);
        assert_eq!(selection.ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn curated_without_flag_column_counts_as_nothing_flagged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        fs::write(config.curated_catalog_path(), "indicador_id,notas
a,x
").expect("curated");

        config.consolidation.dashboard_use_fallback = false;
        let selection = select_dashboard_ids(&config).expect("select");
        assert_eq!(selection.source, SelectionSource::NothingFlagged);

        config.consolidation.dashboard_use_fallback = true;
        let selection = select_dashboard_ids(&config).expect("select");
        assert_eq!(selection.source, SelectionSource::CatalogFallback);
    }

    #[test]
    fn no_catalog_and_no_flags_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        fs::remove_file(config.catalog_csv_path()).expect("remove catalog");
        let selection = select_dashboard_ids(&config).expect("select");
        assert_eq!(selection.source, SelectionSource::Unavailable);
    }
}
