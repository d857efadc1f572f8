mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use common::{Project, ALTAMIRA};
use tsbio::config::CONFIG_ENV_VAR;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_tsbio")
}

fn tsbio(args: &[&str]) -> Command {
    let mut command = Command::new(bin());
    command.args(args).env_remove(CONFIG_ENV_VAR).env_remove("RUST_LOG");
    command
}

/// Config file for a fixture project, using paths relative to the file.
fn write_config(root: &Path) -> PathBuf {
    let codes = ALTAMIRA
        .iter()
        .map(|code| format!("\"{code}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let path = root.join("tsbio.yaml");
    fs::write(
        &path,
        format!(
            "raw_dir: data/Indicadores\n\
             processed_dir: data/Indicadores_processado_por_tema\n\
             outputs_dir: data/Indicadores_processado_por_tema/outputs\n\
             export_xlsx: false\n\
             territories:\n  - id: 1\n    name: Altamira\n    municipalities: [{codes}]\n\
             consolidation:\n  full_format: csv\n"
        ),
    )
    .expect("write config");
    path
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout should be json")
}

#[test]
fn missing_command_is_a_usage_error() {
    let output = tsbio(&[]).output().expect("binary runs");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"));
}

#[test]
fn unknown_command_is_a_usage_error() {
    let output = tsbio(&["serve"]).output().expect("binary runs");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn help_exits_cleanly() {
    let output = tsbio(&["--help"]).output().expect("binary runs");
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("consolidate"));
}

#[test]
fn run_command_executes_every_stage_and_emits_json() {
    let project = Project::new();
    let config = write_config(project.root());

    let output = tsbio(&["run", "--config", config.to_str().expect("utf-8 path")])
        .output()
        .expect("binary runs");
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload = stdout_json(&output);
    assert_eq!(payload["process"]["exported"], 2);
    assert_eq!(payload["process"]["partial"], 1);
    assert_eq!(payload["catalog"]["entries"], 2);
    assert_eq!(payload["consolidate"]["selection"]["source"], "catalog_fallback");
    assert_eq!(payload["consolidate"]["outputs"][0]["kind"], "FULL");
    assert_eq!(payload["consolidate"]["outputs"][0]["rows_written"], 14);
    assert!(project
        .root()
        .join("data/Indicadores_processado_por_tema/outputs/base_consolidada_tsbio_full.csv")
        .is_file());
}

#[test]
fn config_path_can_come_from_the_environment() {
    let project = Project::new();
    let config = write_config(project.root());

    let output = tsbio(&["process"])
        .env(CONFIG_ENV_VAR, &config)
        .output()
        .expect("binary runs");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["files_found"], 5);
}

#[test]
fn stage_failure_exits_with_one() {
    let project = Project::new();
    let config = write_config(project.root());

    let output = tsbio(&["consolidate", "--config", config.to_str().expect("utf-8 path")])
        .output()
        .expect("binary runs");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("consolidate stage failed"));
}
