use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BIN: &str = "gh2cnb";

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures/github-actions")
        .join(name)
}

/// Run from an empty directory so no stray gh2cnb.toml is picked up.
fn gh2cnb(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(BIN).expect("binary should build");
    cmd.current_dir(workdir.path()).env("NO_COLOR", "1");
    cmd
}

#[test]
fn convert_prints_anchored_yaml() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("branch-dev.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains(".build: &build"))
        .stdout(predicate::str::contains("dev:\n  push:\n"))
        .stdout(predicate::str::contains("<<: *build"));
}

#[test]
fn convert_without_anchors_inlines_templates() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .args(["convert", "--no-anchors"])
        .arg(fixture("branch-dev.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("<<").not())
        .stdout(predicate::str::contains(".build").not())
        .stdout(predicate::str::contains("image: ubuntu:22.04"));
}

#[test]
fn convert_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join(".cnb.yml");

    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("nightly-cron.yml"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("CNB config written to"));

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("\"crontab: 0 0 * * *\":"));
}

#[test]
fn convert_reports_warnings_on_stderr() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("node-matrix.yml"))
        .assert()
        .success()
        .stderr(predicate::str::contains("WARNING"))
        .stderr(predicate::str::contains("'release'"))
        .stdout(predicate::str::contains("WARNING").not());
}

#[test]
fn check_passes_when_up_to_date() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join(".cnb.yml");

    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("branch-dev.yml"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("branch-dev.yml"))
        .arg("--check")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date"));
}

#[test]
fn check_fails_when_stale() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join(".cnb.yml");
    std::fs::write(&out, "main:\n  push: []\n").unwrap();

    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("branch-dev.yml"))
        .arg("--check")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is out of date"));
}

#[test]
fn cyclic_workflow_fails_unless_allowed() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("cyclic.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("build -> package"));

    gh2cnb(&dir)
        .args(["convert", "--allow-cycles"])
        .arg(fixture("cyclic.yml"))
        .assert()
        .success()
        .stderr(predicate::str::contains("deadlock"));
}

#[test]
fn config_file_disables_anchors() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("gh2cnb.toml"),
        "[convert]\nanchors = false\n",
    )
    .unwrap();

    gh2cnb(&dir)
        .arg("convert")
        .arg(fixture("branch-dev.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("<<").not());
}

#[test]
fn plan_json_describes_conversion() {
    let dir = TempDir::new().unwrap();
    let output = gh2cnb(&dir)
        .args(["plan", "--format", "json"])
        .arg(fixture("node-matrix.yml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["target_provider"], "cnb");
    assert_eq!(plan["converted_jobs"], 3);
    assert_eq!(plan["default_branch"], "release/v2");
    assert_eq!(plan["warnings"].as_array().unwrap().len(), 2);
}

#[test]
fn plan_text_lists_templates_and_triggers() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .arg("plan")
        .arg(fixture("branch-dev.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Templates"))
        .stdout(predicate::str::contains("push-build <- build"));
}

#[test]
fn graph_renders_mermaid_and_text() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .arg("graph")
        .arg(fixture("node-matrix.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("graph LR"));

    gh2cnb(&dir)
        .args(["graph", "--format", "text"])
        .arg(fixture("unknown-needs.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("'a' needs unknown job 'ghost'"));
}

#[test]
fn missing_workflow_is_an_error() {
    let dir = TempDir::new().unwrap();
    gh2cnb(&dir)
        .args(["convert", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a file"));
}
