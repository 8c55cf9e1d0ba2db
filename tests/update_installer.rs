//! End-to-end update flows against a temporary installation root.

use aienv::error::UpdateError;
use aienv::platform::{self, PlatformOps};
use aienv::update::{self, UpdateInstaller, UpdateOutcome, UpdatePackage};
use aienv::utils::config_paths::EnvPaths;
#[cfg(unix)]
use flate2::{write::GzEncoder, Compression};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

struct Fixture {
    _dir: TempDir,
    paths: EnvPaths,
    launcher: String,
}

impl Fixture {
    /// An installation with a couple of critical paths and a launcher.
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = EnvPaths::new(dir.path().join("AI_Environment"));
        let launcher = platform::current().launcher_script_name().to_string();

        let root = &paths.root;
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src").join("old.py"), "print('old')").unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(root.join("config").join("settings.json"), "{\"a\": 1}").unwrap();
        fs::write(root.join("README.md"), "old readme").unwrap();
        fs::write(root.join(&launcher), "old launcher").unwrap();
        fs::write(
            &paths.version_file,
            r#"{"config_version": "3.0.27", "legacy_support": {"metadata_inline": {"system_version": "3.0.27"}}}"#,
        )
        .unwrap();
        fs::create_dir_all(&paths.drop_dir).unwrap();

        Self {
            _dir: dir,
            paths,
            launcher,
        }
    }

    fn installer(&self) -> UpdateInstaller {
        UpdateInstaller::new(&self.paths, platform::current()).with_helper_launch(false)
    }

    /// Write a zip into the drop folder from `(path, contents)` pairs.
    fn package(&self, name: &str, entries: &[(&str, &str)]) -> UpdatePackage {
        let path = self.paths.drop_dir.join(name);
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (entry, contents) in entries {
            writer.start_file(*entry, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        UpdatePackage::from_path(&path).unwrap()
    }

    /// Write a `.tar.gz` into the drop folder. `links` become symlinks, which
    /// may point nowhere.
    #[cfg(unix)]
    fn tar_package(&self, name: &str, files: &[(&str, &str)], links: &[(&str, &str)]) -> UpdatePackage {
        let path = self.paths.drop_dir.join(name);
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (entry, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, entry, contents.as_bytes()).unwrap();
        }
        for (entry, target) in links {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder.append_link(&mut header, entry, target).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        UpdatePackage::from_path(&path).unwrap()
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.paths.root.join(relative)).unwrap()
    }

    fn version_json(&self) -> Value {
        serde_json::from_str(&fs::read_to_string(&self.paths.version_file).unwrap()).unwrap()
    }
}

/// Every file under `root` except the drop folder, with its bytes.
fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<(PathBuf, Vec<u8>)> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "new_versions")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[test]
fn successful_update_replaces_folders_and_stages_launcher() {
    let fixture = Fixture::new();
    let launcher_entry = format!("AI_Environment/{}", fixture.launcher);
    let package = fixture.package(
        "AI_Environment_v3.0.28.zip",
        &[
            ("AI_Environment/src/new.py", "print('new')"),
            ("AI_Environment/README.md", "new readme"),
            (launcher_entry.as_str(), "new launcher"),
            ("AI_Environment/new_versions/ignored.txt", "never copied"),
        ],
    );
    assert_eq!(package.version.as_deref(), Some("3.0.28"));

    let (report, swap_script, version_recorded) = match fixture.installer().install_update(&package) {
        UpdateOutcome::Installed {
            report,
            swap_script,
            version_recorded,
        } => (report, swap_script, version_recorded),
        other => panic!("update failed: {:?}", other),
    };

    assert_eq!(report.replaced_dirs, vec!["src".to_string()]);
    assert_eq!(report.replaced_files, vec!["README.md".to_string()]);
    assert!(version_recorded);

    assert!(!fixture.paths.root.join("src").join("old.py").exists());
    assert_eq!(fixture.read("src/new.py"), "print('new')");
    assert_eq!(fixture.read("README.md"), "new readme");
    assert_eq!(fixture.read("config/settings.json"), "{\"a\": 1}");

    assert_eq!(fixture.read(&fixture.launcher), "old launcher");
    assert_eq!(
        fixture.read(&format!("{}.new", fixture.launcher)),
        "new launcher"
    );
    let script = swap_script.expect("swap helper written");
    assert!(script.is_file());
    assert!(!fixture.paths.drop_dir.join("ignored.txt").exists());
    assert!(!fixture.paths.backup_dir.exists());

    let version = fixture.version_json();
    assert_eq!(version["config_version"], "3.0.28");
    assert_eq!(
        version["legacy_support"]["metadata_inline"]["system_version"],
        "3.0.28"
    );
    assert!(version["legacy_support"]["metadata_inline"]["created_date"].is_string());
}

#[test]
fn wrong_root_folder_is_rejected_without_touching_the_installation() {
    let fixture = Fixture::new();
    let package = fixture.package("other_v9.9.9.zip", &[("SomethingElse/README.md", "nope")]);
    let before = snapshot(&fixture.paths.root);

    let err = fixture.installer().install(&package).unwrap_err();
    assert!(matches!(err, UpdateError::InvalidPackage { .. }));
    assert_eq!(snapshot(&fixture.paths.root), before);
}

#[test]
fn failed_install_rolls_back_and_reports() {
    let fixture = Fixture::new();
    let package = fixture.package("broken_v1.0.0.zip", &[("Wrong/src/x.py", "x")]);
    let before = snapshot(&fixture.paths.root);

    match fixture.installer().install_update(&package) {
        UpdateOutcome::InstallFailed {
            error,
            restore_error,
        } => {
            assert!(matches!(error, UpdateError::InvalidPackage { .. }));
            assert!(restore_error.is_none());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // The backup is kept after a failed update; everything else is as before.
    let after: Vec<_> = snapshot(&fixture.paths.root)
        .into_iter()
        .filter(|(path, _)| !path.starts_with("backup"))
        .collect();
    assert_eq!(after, before);
    assert_eq!(fixture.version_json()["config_version"], "3.0.27");
}

#[cfg(unix)]
#[test]
fn install_failing_midway_is_rolled_back_byte_for_byte() {
    let fixture = Fixture::new();
    // README.md is replaced first; the dangling `src` link then fails to copy
    // after the live `src` folder was already removed.
    let package = fixture.tar_package(
        "AI_Environment_v3.0.28.tar.gz",
        &[("AI_Environment/README.md", "new readme")],
        &[("AI_Environment/src", "/nonexistent/aienv-update")],
    );
    let before = snapshot(&fixture.paths.root);

    match fixture.installer().install_update(&package) {
        UpdateOutcome::InstallFailed {
            error,
            restore_error,
        } => {
            assert!(matches!(error, UpdateError::Io { .. }), "{:?}", error);
            assert!(restore_error.is_none(), "{:?}", restore_error);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let after: Vec<_> = snapshot(&fixture.paths.root)
        .into_iter()
        .filter(|(path, _)| !path.starts_with("backup"))
        .collect();
    assert_eq!(after, before);
    assert_eq!(fixture.read("src/old.py"), "print('old')");
    assert_eq!(fixture.read("README.md"), "old readme");
    assert!(fixture.paths.backup_dir.join("src").join("old.py").is_file());
    assert_eq!(fixture.version_json()["config_version"], "3.0.27");
}

#[cfg(unix)]
#[test]
fn failed_rollback_is_reported_for_manual_recovery() {
    let mut fixture = Fixture::new();
    // A backup kept inside a folder the archive ships is wiped by the install
    // itself, so the rollback has nothing to read from.
    fs::create_dir_all(fixture.paths.root.join("data")).unwrap();
    fixture.paths.backup_dir = fixture.paths.root.join("data").join("backup");
    let package = fixture.tar_package(
        "AI_Environment_v3.0.28.tar.gz",
        &[
            ("AI_Environment/README.md", "new readme"),
            ("AI_Environment/data/notes.txt", "shipped data"),
        ],
        &[("AI_Environment/zz_broken", "/nonexistent/aienv-update")],
    );

    match fixture.installer().install_update(&package) {
        UpdateOutcome::InstallFailed {
            error,
            restore_error,
        } => {
            assert!(matches!(error, UpdateError::Io { .. }), "{:?}", error);
            let restore_error = restore_error.expect("rollback should fail");
            match restore_error {
                UpdateError::Io { path, .. } => assert!(path.starts_with(&fixture.paths.backup_dir)),
                other => panic!("unexpected restore error: {:?}", other),
            }
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(fixture.read("README.md"), "new readme");
    assert_eq!(fixture.version_json()["config_version"], "3.0.27");
}

#[test]
fn backup_failure_aborts_before_any_change() {
    let mut fixture = Fixture::new();
    let blocker = fixture.paths.root.join("blocker");
    fs::write(&blocker, "a file, not a folder").unwrap();
    fixture.paths.backup_dir = blocker.join("backup");
    let package = fixture.package(
        "AI_Environment_v3.0.28.zip",
        &[("AI_Environment/src/new.py", "print('new')")],
    );
    let before = snapshot(&fixture.paths.root);

    let outcome = fixture.installer().install_update(&package);
    assert!(matches!(outcome, UpdateOutcome::BackupFailed(_)));
    assert!(!outcome.is_success());
    assert_eq!(snapshot(&fixture.paths.root), before);
}

#[test]
fn restore_brings_back_identical_bytes() {
    let fixture = Fixture::new();
    let installer = fixture.installer();
    let before = snapshot(&fixture.paths.root);

    assert!(installer.backup().unwrap() >= 4);
    fs::write(fixture.paths.root.join("src").join("old.py"), "tampered").unwrap();
    fs::remove_dir_all(fixture.paths.root.join("config")).unwrap();
    fs::remove_file(fixture.paths.root.join("README.md")).unwrap();

    installer.restore().unwrap();
    installer.cleanup();
    assert_eq!(snapshot(&fixture.paths.root), before);
}

#[test]
fn scan_orders_by_version_string_then_name() {
    let fixture = Fixture::new();
    for name in ["tool_v2.0.0.zip", "pkg.zip", "update_v1.2.0.zip", "tool_v10.0.0.zip"] {
        fs::write(fixture.paths.drop_dir.join(name), "x").unwrap();
    }
    fs::write(fixture.paths.drop_dir.join("notes.txt"), "x").unwrap();

    let packages = update::scan(&fixture.paths.drop_dir);
    let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["pkg.zip", "update_v1.2.0.zip", "tool_v10.0.0.zip", "tool_v2.0.0.zip"]
    );

    assert_eq!(update::select(&packages, 0), None);
    assert_eq!(
        update::select(&packages, 4).map(|p| p.name.as_str()),
        Some("tool_v2.0.0.zip")
    );
    assert_eq!(update::select(&packages, 5), None);
}

#[test]
fn finalize_without_staged_launcher_is_a_no_op() {
    let fixture = Fixture::new();
    let installer = fixture.installer();
    let helper = fixture
        .paths
        .root
        .join(platform::current().swap_helper_name());

    assert_eq!(installer.finalize_pending_launcher_swap().unwrap(), None);
    assert_eq!(installer.finalize_pending_launcher_swap().unwrap(), None);
    assert!(!helper.exists());
}

#[cfg(unix)]
#[test]
fn swap_helper_is_executable_and_names_both_launchers() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    let staged = fixture
        .paths
        .root
        .join(format!("{}.new", fixture.launcher));
    fs::write(&staged, "new launcher").unwrap();

    let script = fixture
        .installer()
        .with_owner_pid(4242)
        .finalize_pending_launcher_swap()
        .unwrap()
        .expect("helper written");
    let body = fs::read_to_string(&script).unwrap();
    assert!(body.contains("4242"));
    assert!(body.contains(&format!("{}.new", fixture.launcher)));
    assert_eq!(fs::metadata(&script).unwrap().permissions().mode() & 0o111, 0o111);
}

#[test]
fn record_version_without_version_only_moves_timestamps() {
    let fixture = Fixture::new();
    let installer = fixture.installer();

    installer.record_version(None).unwrap();
    let version = fixture.version_json();
    assert_eq!(version["config_version"], "3.0.27");
    let inline = &version["legacy_support"]["metadata_inline"];
    assert_eq!(inline["system_version"], "3.0.27");
    assert!(inline["created_date"].is_string());
    assert!(inline["created_time"].is_string());
}

#[test]
fn record_version_creates_missing_sections() {
    let fixture = Fixture::new();
    fs::write(&fixture.paths.version_file, "{}").unwrap();

    fixture.installer().record_version(Some("4.0.0")).unwrap();
    let version = fixture.version_json();
    assert_eq!(version["config_version"], "4.0.0");
    assert_eq!(
        version["legacy_support"]["metadata_inline"]["system_version"],
        "4.0.0"
    );
}

#[test]
fn missing_metadata_does_not_undo_a_committed_update() {
    let fixture = Fixture::new();
    fs::remove_file(&fixture.paths.version_file).unwrap();
    let err = fixture.installer().record_version(Some("1.0.0")).unwrap_err();
    assert!(matches!(err, UpdateError::MetadataMissing { .. }));

    let package = fixture.package(
        "AI_Environment_v3.0.28.zip",
        &[("AI_Environment/src/new.py", "print('new')")],
    );
    match fixture.installer().install_update(&package) {
        UpdateOutcome::Installed {
            version_recorded, ..
        } => assert!(!version_recorded),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(fixture.read("src/new.py"), "print('new')");
}
