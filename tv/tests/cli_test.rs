//! Binary smoke tests

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `tvd` with its data and log directories inside `home`
fn tvd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tvd").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"));
    cmd
}

fn config_file(home: &TempDir) -> std::path::PathBuf {
    let path = home.path().join("tabvolume.yml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "delivery:\n  max-pending: 4\nstorage:\n  db-path: {}", home.path().join("volumes.db").display()).unwrap();
    path
}

#[test]
fn test_config_prints_effective_yaml() {
    let home = TempDir::new().unwrap();
    let config = config_file(&home);

    tvd(&home)
        .arg("config")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("sweep-interval-ms: 2000"))
        .stdout(predicate::str::contains("max-pending: 4"));
}

#[test]
fn test_records_on_empty_store() {
    let home = TempDir::new().unwrap();
    let config = config_file(&home);

    tvd(&home)
        .args(["records", "--format", "json", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_forget_requires_a_target() {
    let home = TempDir::new().unwrap();
    let config = config_file(&home);

    tvd(&home)
        .arg("forget")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to forget"));
}

#[test]
fn test_forget_tabs_on_empty_store() {
    let home = TempDir::new().unwrap();
    let config = config_file(&home);

    tvd(&home)
        .args(["forget", "--tabs", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Forgot 0 tab records"));
}

#[test]
fn test_browser_launch_with_closed_stdin_exits_cleanly() {
    let home = TempDir::new().unwrap();
    let config = config_file(&home);

    tvd(&home)
        .arg("--config")
        .arg(&config)
        .arg("host")
        .arg("chrome-extension://abcdefghijklmnop/")
        .write_stdin(Vec::<u8>::new())
        .assert()
        .success();
}
