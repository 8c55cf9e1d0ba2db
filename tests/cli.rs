use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

struct TempRoot {
    dir: TempDir,
}

impl TempRoot {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("aienv").expect("binary built");
        cmd.arg("--root").arg(self.dir.path());
        cmd.env_remove("AIENV_ROOT");
        cmd.env("AIENV_INTROSPECTION", "none");
        cmd.env("RUST_LOG", "off");
        cmd
    }
}

#[test]
fn help_lists_subcommands() {
    let root = TempRoot::new();
    root.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ps"))
        .stdout(predicate::str::contains("launch"))
        .stdout(predicate::str::contains("update"));
}

#[test]
fn version_prints_build_info() {
    let root = TempRoot::new();
    root.command()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn empty_registry_lists_nothing() {
    let root = TempRoot::new();
    root.command()
        .args(["ps", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No background processes currently running"));

    root.command()
        .args(["ps", "count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
}

#[test]
fn stale_records_are_pruned_by_count() {
    let root = TempRoot::new();
    fs::write(
        root.dir.path().join("background_processes.json"),
        r#"{"ghost": {"name": "Ghost", "pid": 999999999, "command": "none", "started_at": "2025-01-01 00:00:00"}}"#,
    )
    .unwrap();

    root.command()
        .args(["ps", "count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));

    let saved = fs::read_to_string(root.dir.path().join("background_processes.json")).unwrap();
    assert!(!saved.contains("ghost"));
}

#[test]
fn stopping_unknown_id_fails() {
    let root = TempRoot::new();
    root.command()
        .args(["ps", "stop", "nope"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Process ID 'nope' not found"));
}

#[test]
fn update_scan_lists_drop_folder() {
    let root = TempRoot::new();
    let drop = root.dir.path().join("new_versions");
    fs::create_dir_all(&drop).unwrap();
    fs::write(drop.join("AI_Environment_v3.0.28.zip"), "x").unwrap();
    fs::write(drop.join("readme.txt"), "x").unwrap();

    root.command()
        .args(["update", "scan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AI_Environment_v3.0.28.zip (v3.0.28)"))
        .stdout(predicate::str::contains("readme.txt").not());
}

#[test]
fn update_install_out_of_range_is_rejected() {
    let root = TempRoot::new();
    root.command()
        .args(["update", "install", "--index", "3", "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no update archive at position 3"));
}

#[cfg(unix)]
#[test]
fn run_passes_arguments_with_spaces_unchanged() {
    let root = TempRoot::new();
    root.command()
        .args(["run", "--name", "Touch", "touch", "marker file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Touch launched successfully"));

    let marker = root.dir.path().join("marker file");
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !marker.exists() && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    assert!(marker.exists());
    assert!(!root.dir.path().join("marker").exists());
}
