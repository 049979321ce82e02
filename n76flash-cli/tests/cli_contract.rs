//! Integration tests for core CLI contract behavior.

use {
    predicates::prelude::*,
    std::fs,
    tempfile::{TempDir, tempdir},
};

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("n76flash")
}

/// A command isolated from the caller's environment and config files.
fn isolated_cmd(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .env_remove("N76FLASH_PORT")
        .env_remove("N76FLASH_SEARCH")
        .env_remove("N76FLASH_TRIES")
        .env_remove("N76FLASH_NON_INTERACTIVE");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("n76flash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn legacy_help_exits_zero() {
    let mut cmd = cli_cmd();
    cmd.arg("-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"));
}

#[test]
fn no_arguments_prints_help() {
    let mut cmd = cli_cmd();
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("n76flash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn missing_file_option_exits_one() {
    let dir = tempdir().unwrap();
    isolated_cmd(&dir)
        .args(["-port", "ttyUSB0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--file"));
}

#[test]
fn non_numeric_tries_exits_one() {
    let dir = tempdir().unwrap();
    isolated_cmd(&dir)
        .args(["-file", "fw.bin", "-tries", "abc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn unknown_option_exits_one() {
    let dir = tempdir().unwrap();
    isolated_cmd(&dir)
        .args(["-f", "fw.bin", "--baud", "115200"])
        .assert()
        .code(1);
}

#[test]
fn missing_firmware_file_exits_one() {
    let dir = tempdir().unwrap();
    isolated_cmd(&dir)
        .args(["-f", "missing.bin", "-p", "ttyUSB0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("missing.bin"));
}

#[test]
fn empty_firmware_file_exits_one() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("empty.bin"), b"").unwrap();

    isolated_cmd(&dir)
        .args(["-f", "empty.bin", "-p", "ttyUSB0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("empty"));
}

#[cfg(unix)]
#[test]
fn no_matching_port_exits_one() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("fw.bin"), [0x02u8; 20]).unwrap();

    isolated_cmd(&dir)
        .args(["-file", "fw.bin", "-search", "n76flash-no-such-prefix"])
        .arg("--non-interactive")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no serial port matching"));
}

#[cfg(unix)]
#[test]
fn search_prefix_from_environment() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("fw.bin"), [0x02u8; 20]).unwrap();

    isolated_cmd(&dir)
        .env("N76FLASH_SEARCH", "n76flash-env-prefix")
        .args(["-f", "fw.bin", "--non-interactive"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("n76flash-env-prefix"));
}

#[test]
fn unopenable_port_exits_one() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("fw.bin"), [0x02u8; 20]).unwrap();
    let port = dir.path().join("no-such-tty");

    isolated_cmd(&dir)
        .args(["-f", "fw.bin", "-p"])
        .arg(&port)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot open"));
}

#[cfg(unix)]
#[test]
fn local_config_file_is_read() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("fw.bin"), [0x02u8; 20]).unwrap();
    fs::write(
        dir.path().join("n76flash.toml"),
        "[connection]\nsearch = \"n76flash-config-prefix\"\n",
    )
    .unwrap();

    isolated_cmd(&dir)
        .args(["-f", "fw.bin", "--non-interactive"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("n76flash-config-prefix"));
}
