//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_prints_usage_without_a_subcommand() {
    let mut cmd = cargo_bin_cmd!("mistok");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn cli_help_describes_the_tool() {
    let mut cmd = cargo_bin_cmd!("mistok");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("Provision SSH-reachable job pods"));
}

#[test]
fn launch_reports_unreadable_key_files() {
    let mut cmd = cargo_bin_cmd!("mistok");
    cmd.args([
        "launch",
        "--project",
        "p1",
        "--run-name",
        "demo",
        "--image",
        "docker.io/library/ubuntu:22.04",
        "--user-public-key",
        "/nonexistent/user.pub",
        "--project-public-key",
        "/nonexistent/project.pub",
        "--project-private-key",
        "/nonexistent/project.key",
    ]);
    cmd.assert()
        .failure()
        .stderr(contains("failed to read key file"));
}

#[test]
fn offers_requires_a_relay_host() {
    let mut cmd = cargo_bin_cmd!("mistok");
    cmd.arg("offers")
        .env_remove("MISTOK_SSH_HOST")
        .env_remove("MISTOK_CONFIG_PATH");
    cmd.assert()
        .failure()
        .stderr(contains("missing jump relay host"));
}
