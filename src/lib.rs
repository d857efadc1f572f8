//! TSBio indicator pipeline.
//!
//! Raw municipal indicator tables go through three stages, each driven by one
//! [`config::PipelineConfig`]:
//!
//! 1. [`ingest`]: normalize columns and municipality codes, keep territory members,
//!    bucket by (category, source, theme) and export one table per bucket plus a
//!    validation report.
//! 2. [`catalog`]: summarize every exported table and synchronize the human-curated
//!    catalog that selects dashboard indicators.
//! 3. [`consolidate`]: stream the exported tables into long-format FULL and DASHBOARD
//!    bases (csv, csv.gz or parquet).

pub mod catalog;
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod normalize;
pub mod table;
pub mod territory;

pub use config::{ConsolidationConfig, OutputFormat, PipelineConfig};
pub use error::{PipelineError, Result};
