use assert_cmd::prelude::*;
#[allow(unused_imports)]
use predicates::prelude::*;

use std::process::Command;

#[test]
fn no_subcommand_fails_with_usage() {
    let mut cmd = Command::cargo_bin("irmasim").expect("Calling binary failed");
    cmd.assert().failure();
}

#[test]
fn test_version() {
    let expected_version = "irmasim 0.1.0\n";
    let mut cmd = Command::cargo_bin("irmasim").expect("Calling binary failed");
    cmd.arg("--version").assert().stdout(expected_version);
}

#[test]
fn run_without_a_platform_file_fails_with_a_config_error() {
    let dir = std::env::temp_dir().join(format!("irmasim-cli-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let workload = dir.join("workload.json");
    std::fs::write(&workload, r#"{"jobs":[]}"#).unwrap();

    let mut cmd = Command::cargo_bin("irmasim").expect("Calling binary failed");
    cmd.arg("run")
        .arg("--workload")
        .arg(&workload)
        .arg("--output-dir")
        .arg(&dir)
        .assert()
        .failure();
}
