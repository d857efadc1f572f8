//! Pipeline configuration: every path and flag the stages need, built once and
//! passed by reference. Loaded from YAML; relative paths resolve against the
//! directory holding the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::territory::{default_territories, TerritoryDefinition};

pub const CONFIG_ENV_VAR: &str = "TSBIO_CONFIG";

const VALIDATION_REPORT_FILE: &str = "_relatorio_validacao.csv";
const MISSING_MUNICIPALITY_FILE: &str = "_sem_coluna_cod_municipio.csv";
const READ_ERRORS_FILE: &str = "_erros_leitura.csv";
const CATALOG_STEM: &str = "catalogo_indicadores_tsbio";
const BASE_STEM: &str = "base_consolidada_tsbio";

/// Physical format of a consolidated base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    CsvGz,
    Parquet,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::CsvGz => "csv_gz",
            Self::Parquet => "parquet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::CsvGz => "csv.gz",
            Self::Parquet => "parquet",
        }
    }
}

/// Which consolidated base is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKind {
    Full,
    Dashboard,
    DashboardRich,
}

impl BaseKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Dashboard => "DASHBOARD",
            Self::DashboardRich => "DASHBOARD_RICH",
        }
    }

    fn file_suffix(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Dashboard => "dashboard",
            Self::DashboardRich => "dashboard_rich",
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, Self::DashboardRich)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub full_format: OutputFormat,
    pub dashboard_format: OutputFormat,
    pub dashboard_rich_format: OutputFormat,
    /// Drop long rows whose value did not parse as a number.
    pub only_numeric_rows: bool,
    /// Drop repeated text columns (theme, category, source, origin, territory name).
    pub drop_repeated_text: bool,
    pub generate_full: bool,
    pub generate_dashboard: bool,
    pub generate_dashboard_rich: bool,
    /// Rich base keeps the repeated text columns even when `drop_repeated_text` is set.
    pub rich_keep_text_columns: bool,
    /// Rich base pivots on every non-value column, not only the identity columns.
    pub rich_include_extra_dims: bool,
    pub dashboard_flag_column: String,
    pub dashboard_use_fallback: bool,
    pub dashboard_fallback_max: usize,
    pub keep_intermediate_csv: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            full_format: OutputFormat::CsvGz,
            dashboard_format: OutputFormat::Parquet,
            dashboard_rich_format: OutputFormat::Parquet,
            only_numeric_rows: true,
            drop_repeated_text: true,
            generate_full: true,
            generate_dashboard: true,
            generate_dashboard_rich: true,
            rich_keep_text_columns: true,
            rich_include_extra_dims: true,
            dashboard_flag_column: "dashboard".to_string(),
            dashboard_use_fallback: true,
            dashboard_fallback_max: 80,
            keep_intermediate_csv: false,
        }
    }
}

impl ConsolidationConfig {
    pub fn format_for(&self, kind: BaseKind) -> OutputFormat {
        match kind {
            BaseKind::Full => self.full_format,
            BaseKind::Dashboard => self.dashboard_format,
            BaseKind::DashboardRich => self.dashboard_rich_format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub dictionary_path: PathBuf,
    pub processed_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub output_separator: char,
    pub export_csv: bool,
    pub export_xlsx: bool,
    /// Only these categories are ingested when non-empty (slug comparison).
    pub category_filter: Vec<String>,
    /// Only these themes are ingested when non-empty (slug comparison).
    pub theme_filter: Vec<String>,
    pub territories: Vec<TerritoryDefinition>,
    pub consolidation: ConsolidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_project_dir(".")
    }
}

impl PipelineConfig {
    /// Standard project layout: `data/Indicadores` in, `data/Indicadores_processado_por_tema` out.
    pub fn for_project_dir(project_dir: impl AsRef<Path>) -> Self {
        let project_dir = project_dir.as_ref();
        let data_dir = project_dir.join("data");
        let processed_dir = data_dir.join("Indicadores_processado_por_tema");
        Self {
            raw_dir: data_dir.join("Indicadores"),
            dictionary_path: project_dir
                .join("notebook")
                .join("dicionario_nomes_oficial_tsbio.csv"),
            outputs_dir: processed_dir.join("outputs"),
            processed_dir,
            output_separator: ';',
            export_csv: true,
            export_xlsx: true,
            category_filter: Vec::new(),
            theme_filter: Vec::new(),
            territories: default_territories(),
            consolidation: ConsolidationConfig::default(),
        }
    }

    /// Load a YAML config. Missing keys take the defaults of `for_project_dir`
    /// rooted at the config file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| PipelineError::io(path, err))?;
        let mut config: PipelineConfig =
            serde_yaml::from_str(&raw).map_err(|source| PipelineError::Config {
                path: path.to_path_buf(),
                source,
            })?;

        if !config.output_separator.is_ascii() {
            return Err(PipelineError::Malformed {
                path: path.to_path_buf(),
                message: format!(
                    "output_separator must be a single ASCII character, got '{}'",
                    config.output_separator
                ),
            });
        }

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for field in [
            &mut config.raw_dir,
            &mut config.dictionary_path,
            &mut config.processed_dir,
            &mut config.outputs_dir,
        ] {
            if field.is_relative() {
                *field = base.join(&*field);
            }
        }
        Ok(config)
    }

    pub fn separator_byte(&self) -> u8 {
        u8::try_from(self.output_separator).unwrap_or(b';')
    }

    pub fn processed_csv_dir(&self) -> PathBuf {
        self.processed_dir.join("csv")
    }

    pub fn processed_xlsx_dir(&self) -> PathBuf {
        self.processed_dir.join("xlsx")
    }

    pub fn validation_report_path(&self) -> PathBuf {
        self.processed_dir.join(VALIDATION_REPORT_FILE)
    }

    pub fn missing_municipality_report_path(&self) -> PathBuf {
        self.processed_dir.join(MISSING_MUNICIPALITY_FILE)
    }

    pub fn read_errors_report_path(&self) -> PathBuf {
        self.processed_dir.join(READ_ERRORS_FILE)
    }

    pub fn catalog_csv_path(&self) -> PathBuf {
        self.outputs_dir.join(format!("{CATALOG_STEM}.csv"))
    }

    pub fn catalog_xlsx_path(&self) -> PathBuf {
        self.outputs_dir.join(format!("{CATALOG_STEM}.xlsx"))
    }

    pub fn curated_catalog_path(&self) -> PathBuf {
        self.outputs_dir.join(format!("{CATALOG_STEM}_curado.csv"))
    }

    pub fn base_path(&self, kind: BaseKind, format: OutputFormat) -> PathBuf {
        self.outputs_dir.join(format!(
            "{BASE_STEM}_{}.{}",
            kind.file_suffix(),
            format.extension()
        ))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.processed_csv_dir(),
            self.processed_xlsx_dir(),
            self.outputs_dir.clone(),
        ] {
            fs::create_dir_all(&dir).map_err(|err| PipelineError::io(&dir, err))?;
        }
        Ok(())
    }
}
