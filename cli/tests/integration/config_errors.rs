//! Configuration and credential errors surface before any provider call.

#![allow(clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::cli_tests::docker_cloud;

/// Command pointed at a config file inside `dir` (which may not exist).
fn with_config(dir: &Path) -> Command {
    let mut cmd = docker_cloud();
    cmd.arg("--config").arg(dir.join("config.yaml"));
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::write(dir.path().join("config.yaml"), yaml).expect("write config");
}

#[test]
fn test_start_without_project_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    with_config(dir.path())
        .arg("start")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: No project configured"));
}

#[test]
fn test_stop_without_project_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    with_config(dir.path())
        .arg("stop")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No project configured"));
}

#[test]
fn test_invalid_zone_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    with_config(dir.path())
        .args(["start", "--project", "demo", "--zone", "us-central1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid zone 'us-central1'"));
}

#[test]
fn test_invalid_instance_name_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    with_config(dir.path())
        .args(["start", "--project", "demo", "--instance-name", "Web_1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid instance name 'Web_1'"));
}

#[test]
fn test_same_docker_and_tunnel_port_is_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(&dir, "project: demo\ncredentials:\n  source: env\n");
    with_config(dir.path())
        .args(["start", "--docker-port", "2375", "--tunnel-port", "2375"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No credentials found"))
        .stderr(predicate::str::contains("Invalid").not());
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(&dir, "project: demo\noperations:\n  poll_interval_secs: 0\n");
    with_config(dir.path())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid operation poll interval: 0s"));
}

#[test]
fn test_project_from_environment_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(&dir, "zone: nowhere\n");
    with_config(dir.path())
        .env("DOCKER_CLOUD_PROJECT", "demo")
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No project configured").not())
        .stderr(predicate::str::contains("Invalid zone 'nowhere'"));
}

#[test]
fn test_malformed_config_names_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(&dir, "instance: [not, a, map\n");
    with_config(dir.path())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"))
        .stderr(predicate::str::contains("config.yaml"));
}

#[test]
fn test_pinned_env_credentials_without_token_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(&dir, "project: demo\ncredentials:\n  source: env\n");
    with_config(dir.path())
        .arg("stop")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "obtaining Compute API credentials: No credentials found",
        ));
}

#[test]
fn test_pinned_cache_credentials_with_missing_file_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_config(&dir, "project: demo\ncredentials:\n  source: cache\n");
    with_config(dir.path())
        .arg("stop")
        .arg("--credentials")
        .arg(dir.path().join("absent-credentials"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("obtaining Compute API credentials"))
        .stderr(predicate::str::contains("absent-credentials"));
}
