use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures that abort a stage. Single-file problems are reported as
/// [`FileFailure`] values instead and never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("spreadsheet error on {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("parquet error on {path}: {message}")]
    Parquet { path: PathBuf, message: String },

    #[error("required input not found: {what} ({path})")]
    MissingInput { what: &'static str, path: PathBuf },

    #[error("curated catalog {path} has no '{column}' column")]
    MalformedCurated { path: PathBuf, column: String },

    #[error("malformed table {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn csv(path: impl AsRef<Path>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn missing(what: &'static str, path: impl AsRef<Path>) -> Self {
        Self::MissingInput {
            what,
            path: path.as_ref().to_path_buf(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// One input file that was skipped, with the reason recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    pub fn new(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}
