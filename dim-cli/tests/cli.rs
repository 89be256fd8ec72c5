use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn dim(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dim").expect("Binary exists");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().expect("Creating temp dir failed");
    dim(&dir).arg("init").assert().success();
    dir
}

#[test]
fn list_outside_a_project_points_at_init() {
    let dir = TempDir::new().unwrap();
    dim(&dir)
        .arg("list")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("dim init"));
}

#[test]
fn init_creates_documents_and_install_root() {
    let dir = initialized();
    assert!(dir.path().join("dim.json").is_file());
    assert!(dir.path().join("dim-lock.json").is_file());
    assert!(dir.path().join("data_files").is_dir());

    let manifest = fs::read_to_string(dir.path().join("dim.json")).unwrap();
    assert!(manifest.contains("\"fileVersion\""));
    assert!(manifest.contains("\"contents\""));
}

#[test]
fn init_twice_keeps_existing_documents() {
    let dir = initialized();
    let manifest = dir.path().join("dim.json");
    let before = fs::read_to_string(&manifest).unwrap();
    dim(&dir).arg("init").assert().success();
    assert_eq!(fs::read_to_string(&manifest).unwrap(), before);
}

#[test]
fn url_and_file_together_are_rejected() {
    let dir = initialized();
    dim(&dir)
        .args(["install", "https://example.com/a.csv", "-n", "a", "-f", "dim.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not both"));
}

#[test]
fn url_without_name_is_rejected() {
    let dir = initialized();
    dim(&dir)
        .args(["install", "https://example.com/a.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--name"));
}

#[test]
fn empty_manifest_install_is_a_noop() {
    let dir = initialized();
    dim(&dir)
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("All contents already installed"));
}

#[test]
fn invalid_pipeline_fails_before_download() {
    let dir = initialized();
    dim(&dir)
        .args([
            "install",
            "http://127.0.0.1:9/archive.zip",
            "-n",
            "archive",
            "-p",
            "unzip extra-arg",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid post-process"));

    let lock = fs::read_to_string(dir.path().join("dim-lock.json")).unwrap();
    assert!(!lock.contains("archive"));
    assert!(!dir.path().join("data_files/archive").exists());
}

#[test]
fn uninstall_unknown_name_fails() {
    let dir = initialized();
    dim(&dir)
        .args(["uninstall", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No content named 'ghost'"));
}

#[test]
fn verify_empty_project_succeeds() {
    let dir = initialized();
    dim(&dir)
        .args(["verify", "--strict"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verification success"));
}

#[test]
fn list_empty_project_prints_nothing() {
    let dir = initialized();
    dim(&dir)
        .args(["list", "--simple"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
