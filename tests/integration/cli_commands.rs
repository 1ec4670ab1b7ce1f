#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;
use tpch_compare::HarnessConfig;

fn cli(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tpch-compare");
    cmd.env_remove("TPCH_COMPARE_CONFIG")
        .env_remove("TPCH_PG_PASSWORD")
        .env("RUST_LOG", "warn")
        .arg("--quiet")
        .arg("--config")
        .arg(config);
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

#[test]
fn help_lists_every_phase() {
    let output = cargo_bin_cmd!("tpch-compare")
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .clone();
    let help = stdout_of(&output);
    for command in ["run", "provision", "queries", "inserts", "config", "completions"] {
        assert!(help.contains(command), "help is missing {command}: {help}");
    }
}

#[test]
fn config_init_then_show_round_trips_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("config.toml");

    cli(&path).args(["config", "init"]).assert().success();
    let written = fs::read_to_string(&path).expect("config written");
    let parsed = HarnessConfig::from_toml_str(&written).expect("valid toml");
    assert_eq!(parsed, HarnessConfig::default());

    let output = cli(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .get_output()
        .clone();
    let shown = stdout_of(&output);
    assert!(shown.contains("scale_factor = 1.0"), "{shown}");
    assert!(shown.contains("scratch_table = \"lineitem_copy\""), "{shown}");
}

#[test]
fn config_show_redacts_password_and_applies_overrides() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    let output = cli(&path)
        .env("TPCH_PG_PASSWORD", "s3cret")
        .args(["--query-count", "3", "--order", "interleaved", "config", "show"])
        .assert()
        .success()
        .get_output()
        .clone();
    let shown = stdout_of(&output);
    assert!(!shown.contains("s3cret"));
    assert!(shown.contains("<redacted>"));
    assert!(shown.contains("count = 3"));
    assert!(shown.contains("order = \"interleaved\""));
}

#[test]
fn config_init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[queries]\ncount = 2\n").expect("seed config");

    cli(&path).args(["config", "init"]).assert().code(6);
    assert!(fs::read_to_string(&path).expect("read").contains("count = 2"));

    cli(&path).args(["config", "init", "--force"]).assert().success();
    assert!(fs::read_to_string(&path).expect("read").contains("count = 5"));
}

#[test]
fn config_path_prints_the_explicit_location() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("custom.toml");
    let output = cli(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_of(&output).trim(), path.display().to_string());
}

#[test]
fn malformed_config_exits_with_config_code() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[dataset]\nscale_factor = \"big\"\n").expect("write");
    cli(&path).args(["config", "show"]).assert().code(6);
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[queries]\ncuont = 5\n").expect("write");
    cli(&path).args(["queries"]).assert().code(6);
}

#[test]
fn invalid_scale_factor_fails_before_connecting() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    cli(&path)
        .args(["--scale-factor", "0", "provision"])
        .assert()
        .code(6);
}

#[test]
fn missing_query_file_is_a_resource_error() {
    let dir = TempDir::new().expect("tempdir");
    let queries = dir.path().join("sql");
    fs::create_dir_all(&queries).expect("mkdir");
    fs::write(queries.join("q1.sql"), "SELECT 1;").expect("write q1");
    let output = cli(&dir.path().join("config.toml"))
        .arg("--query-dir")
        .arg(&queries)
        .args(["--query-count", "2", "queries"])
        .assert()
        .code(4)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("q2.sql"), "{stderr}");
}

#[test]
fn completions_mention_the_binary() {
    let output = cargo_bin_cmd!("tpch-compare")
        .args(["completions", "bash"])
        .assert()
        .success()
        .get_output()
        .clone();
    assert!(stdout_of(&output).contains("tpch-compare"));
}
