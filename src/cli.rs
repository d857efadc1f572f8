use std::path::PathBuf;

use anyhow::Context;
use clap::{error::ErrorKind, Parser, Subcommand};
use serde_json::json;

use crate::catalog::run_catalog;
use crate::config::{PipelineConfig, CONFIG_ENV_VAR};
use crate::consolidate::run_consolidation;
use crate::ingest::{run_ingest, IngestOutcome};
use crate::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "tsbio", version, about = "TSBio indicator pipeline")]
struct Cli {
    /// YAML configuration; defaults to the standard layout under the current directory.
    #[arg(long, short, global = true, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Normalize raw files into one table per (category, source, theme).
    Process,
    /// Build the indicator catalog and sync the curated copy.
    Catalog,
    /// Write the long-format consolidated bases.
    Consolidate,
    /// Process, catalog and consolidate in order.
    Run,
}

/// Parse `args` (program name first) and run the requested stage.
///
/// Exit codes: 0 on success, 1 when a stage fails, 2 on usage errors.
pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 2,
            };
        }
    };
    init_logging(cli.verbose);

    match dispatch(&cli) {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(text) => {
                println!("{text}");
                0
            }
            Err(err) => {
                eprintln!("failed to render summary: {err}");
                1
            }
        },
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn ingest_summary(outcome: &IngestOutcome) -> serde_json::Value {
    json!({
        "files_found": outcome.files_found,
        "skipped_by_filter": outcome.skipped_by_filter,
        "buckets": outcome.report.len(),
        "exported": outcome.exported(),
        "partial": outcome.partial(),
        "empty": outcome.empty(),
        "read_errors": outcome.read_failures.len(),
        "without_municipality": outcome.missing_municipality.len(),
    })
}

fn dispatch(cli: &Cli) -> anyhow::Result<serde_json::Value> {
    let config = load_config(cli.config.as_ref())?;

    let process = |config: &PipelineConfig| {
        run_ingest(config)
            .map(|outcome| ingest_summary(&outcome))
            .context("process stage failed")
    };
    let catalog = |config: &PipelineConfig| {
        run_catalog(config)
            .context("catalog stage failed")
            .and_then(|outcome| Ok(serde_json::to_value(outcome)?))
    };
    let consolidate = |config: &PipelineConfig| {
        run_consolidation(config)
            .context("consolidate stage failed")
            .and_then(|outcome| Ok(serde_json::to_value(outcome)?))
    };

    match cli.command {
        Command::Process => process(&config),
        Command::Catalog => catalog(&config),
        Command::Consolidate => consolidate(&config),
        Command::Run => Ok(json!({
            "process": process(&config)?,
            "catalog": catalog(&config)?,
            "consolidate": consolidate(&config)?,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn subcommands_and_global_flags_parse() {
        let cli = Cli::try_parse_from(args(&["tsbio", "consolidate", "--config", "x.yaml", "-v"]))
            .expect("parses");
        assert_eq!(cli.command, Command::Consolidate);
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
        assert!(cli.verbose);
    }

    #[test]
    fn unknown_or_missing_command_is_a_usage_error() {
        assert_eq!(run_with_args(&args(&["tsbio"])), 2);
        assert_eq!(run_with_args(&args(&["tsbio", "serve"])), 2);
    }

    #[test]
    fn missing_config_file_fails_the_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.yaml");
        let code = run_with_args(&args(&[
            "tsbio",
            "process",
            "--config",
            missing.to_str().expect("utf-8 path"),
        ]));
        assert_eq!(code, 1);
    }
}
