//! Backup, install, rollback.
//!
//! `install_update` is a single-participant two-phase commit: the backup is
//! the undo log, `install` the only destructive step, and `restore` the
//! rollback. Once `install` succeeds the update counts as committed.

use chrono::Local;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{
    BACKUP_DIR_NAME, DROP_DIR_NAME, INSTALL_ROOT_FOLDER, STAGED_SUFFIX, VERSION_FILE_NAME,
};
use crate::error::{UpdateError, UpdateResult};
use crate::platform::PlatformOps;
use crate::update::backup::{self, copy_path, remove_path};
use crate::update::package::UpdatePackage;
use crate::update::archive;
use crate::utils::config_paths::EnvPaths;

/// What an update package is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLayout {
    /// Folder every archive must carry at its top level
    pub root_folder: String,
    /// Working directories never replaced from an archive
    pub reserved: Vec<String>,
    /// Launcher that may be running us; staged instead of overwritten
    pub launcher: String,
    /// Paths copied into the backup before installing
    pub critical_paths: Vec<String>,
}

impl UpdateLayout {
    pub fn for_platform(platform: &dyn PlatformOps) -> Self {
        let ext = platform.script_extension();
        let launcher = platform.launcher_script_name().to_string();
        Self {
            root_folder: INSTALL_ROOT_FOLDER.to_string(),
            reserved: vec![DROP_DIR_NAME.to_string(), BACKUP_DIR_NAME.to_string()],
            critical_paths: vec![
                "src".to_string(),
                "config".to_string(),
                VERSION_FILE_NAME.to_string(),
                launcher.clone(),
                format!("setup_python_env{ext}"),
                format!("check_versions{ext}"),
                "README.md".to_string(),
                "PACKAGE_INFO.txt".to_string(),
                "CHECKSUMS.sha256".to_string(),
            ],
            launcher,
        }
    }

    pub fn staged_launcher(&self) -> String {
        format!("{}{}", self.launcher, STAGED_SUFFIX)
    }
}

/// What `install` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub replaced_dirs: Vec<String>,
    pub replaced_files: Vec<String>,
    pub staged_launcher: Option<PathBuf>,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    /// Nothing was touched.
    BackupFailed(UpdateError),
    /// Install failed. `restore_error` set means the rollback failed too and
    /// the backup folder must be restored by hand.
    InstallFailed {
        error: UpdateError,
        restore_error: Option<UpdateError>,
    },
    Installed {
        report: InstallReport,
        swap_script: Option<PathBuf>,
        version_recorded: bool,
    },
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Installed { .. })
    }
}

pub struct UpdateInstaller {
    install_root: PathBuf,
    backup_root: PathBuf,
    layout: UpdateLayout,
    platform: Arc<dyn PlatformOps>,
    owner_pid: u32,
    launch_helper: bool,
}

impl UpdateInstaller {
    pub fn new(paths: &EnvPaths, platform: Arc<dyn PlatformOps>) -> Self {
        Self {
            install_root: paths.root.clone(),
            backup_root: paths.backup_dir.clone(),
            layout: UpdateLayout::for_platform(platform.as_ref()),
            platform,
            owner_pid: std::process::id(),
            launch_helper: true,
        }
    }

    pub fn with_layout(mut self, layout: UpdateLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Process the swap helper waits on before touching the launcher.
    pub fn with_owner_pid(mut self, pid: u32) -> Self {
        self.owner_pid = pid;
        self
    }

    /// Whether `install_update` starts the swap helper or only writes it.
    pub fn with_helper_launch(mut self, launch: bool) -> Self {
        self.launch_helper = launch;
        self
    }

    pub fn layout(&self) -> &UpdateLayout {
        &self.layout
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn backup(&self) -> UpdateResult<usize> {
        backup::backup(&self.install_root, &self.backup_root, &self.layout.critical_paths)
    }

    pub fn restore(&self) -> UpdateResult<usize> {
        backup::restore(&self.install_root, &self.backup_root)
    }

    pub fn cleanup(&self) {
        backup::cleanup(&self.backup_root)
    }

    /// Extract `package` to a staging directory, verify its identity and copy
    /// its contents over the installation root.
    ///
    /// Nothing under the root is modified unless the archive extracts cleanly
    /// and carries the expected top-level folder.
    pub fn install(&self, package: &UpdatePackage) -> UpdateResult<InstallReport> {
        let staging = tempfile::Builder::new()
            .prefix("aienv-update-")
            .tempdir()
            .map_err(|e| UpdateError::io(std::env::temp_dir(), e))?;
        archive::extract(&package.path, staging.path())?;

        let source_root = staging.path().join(&self.layout.root_folder);
        if !source_root.is_dir() {
            return Err(UpdateError::invalid(format!(
                "'{}' folder not found at the top level of {}",
                self.layout.root_folder, package.name
            )));
        }

        let mut report = InstallReport::default();
        let result = self.apply(&source_root, &mut report);
        if result.is_err() {
            // A launcher staged by a failed install must never be swapped in later.
            if let Some(staged) = &report.staged_launcher {
                let _ = fs::remove_file(staged);
            }
        }
        result.map(|()| report)
    }

    fn apply(&self, source_root: &Path, report: &mut InstallReport) -> UpdateResult<()> {
        let mut items: Vec<PathBuf> = fs::read_dir(source_root)
            .map_err(|e| UpdateError::io(source_root, e))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<_>>()
            .map_err(|e| UpdateError::io(source_root, e))?;
        items.sort();

        for item in items {
            let name = item
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.layout.reserved.contains(&name) {
                debug!(item = %name, "reserved; skipped");
                continue;
            }
            let dest = self.install_root.join(&name);

            if item.is_dir() {
                if dest.symlink_metadata().is_ok() {
                    remove_path(&dest).map_err(|e| UpdateError::io(&dest, e))?;
                }
                copy_path(&item, &dest)?;
                info!(folder = %name, "updated folder");
                report.replaced_dirs.push(name);
            } else if name == self.layout.launcher {
                let staged = self.install_root.join(self.layout.staged_launcher());
                copy_path(&item, &staged)?;
                info!(launcher = %name, "staged new launcher");
                report.staged_launcher = Some(staged);
            } else {
                if dest.symlink_metadata().is_ok() {
                    remove_path(&dest).map_err(|e| UpdateError::io(&dest, e))?;
                }
                copy_path(&item, &dest)?;
                debug!(file = %name, "updated file");
                report.replaced_files.push(name);
            }
        }
        Ok(())
    }

    /// If a staged launcher exists, write the helper that swaps it in after
    /// this process exits. Returns the helper path, or `None` when nothing is
    /// staged. Never runs the swap itself.
    pub fn finalize_pending_launcher_swap(&self) -> UpdateResult<Option<PathBuf>> {
        let staged = self.install_root.join(self.layout.staged_launcher());
        if !staged.is_file() {
            return Ok(None);
        }

        let launcher = self.install_root.join(&self.layout.launcher);
        let script_path = self.install_root.join(self.platform.swap_helper_name());
        let body = self
            .platform
            .launcher_swap_script(self.owner_pid, &launcher, &staged);
        fs::write(&script_path, body).map_err(|e| UpdateError::io(&script_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))
                .map_err(|e| UpdateError::io(&script_path, e))?;
        }

        info!(helper = %script_path.display(), "launcher swap scheduled for exit");
        Ok(Some(script_path))
    }

    /// Stamp the version metadata file with `version` and the current date
    /// and time. With no version only the timestamp moves.
    pub fn record_version(&self, version: Option<&str>) -> UpdateResult<()> {
        let path = self.install_root.join(VERSION_FILE_NAME);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => UpdateError::MetadataMissing { path: path.clone() },
            _ => UpdateError::io(&path, e),
        })?;
        let mut config: Value = serde_json::from_str(&content)
            .map_err(|e| UpdateError::MetadataFormat { message: e.to_string() })?;
        if !config.is_object() {
            return Err(UpdateError::MetadataFormat {
                message: "top level is not an object".to_string(),
            });
        }

        let now = Local::now();
        ensure_object(&mut config["legacy_support"]);
        ensure_object(&mut config["legacy_support"]["metadata_inline"]);
        if let Some(version) = version {
            config["config_version"] = Value::from(version);
            config["legacy_support"]["metadata_inline"]["system_version"] = Value::from(version);
        }
        let inline = &mut config["legacy_support"]["metadata_inline"];
        inline["created_date"] = Value::from(now.format("%Y-%m-%d").to_string());
        inline["created_time"] = Value::from(now.format("%H:%M").to_string());

        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| UpdateError::MetadataFormat { message: e.to_string() })?;
        fs::write(&path, json).map_err(|e| UpdateError::io(&path, e))?;
        info!(version = version.unwrap_or("unchanged"), "version metadata updated");
        Ok(())
    }

    /// Backup, install, and either roll back or finalize.
    pub fn install_update(&self, package: &UpdatePackage) -> UpdateOutcome {
        info!(package = %package.name, version = ?package.version, "installing update");

        if let Err(err) = self.backup() {
            error!(error = %err, "backup failed; update aborted before any change");
            return UpdateOutcome::BackupFailed(err);
        }

        let report = match self.install(package) {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "install failed; restoring backup");
                let restore_error = match self.restore() {
                    Ok(_) => None,
                    Err(restore_err) => {
                        error!(
                            error = %restore_err,
                            backup = %self.backup_root.display(),
                            "restore failed; manual recovery required"
                        );
                        Some(restore_err)
                    }
                };
                return UpdateOutcome::InstallFailed {
                    error: err,
                    restore_error,
                };
            }
        };

        let swap_script = match self.finalize_pending_launcher_swap() {
            Ok(script) => script,
            Err(err) => {
                warn!(error = %err, "could not schedule launcher swap");
                None
            }
        };
        if let Some(script) = &swap_script {
            if self.launch_helper {
                self.start_helper(script);
            }
        }

        self.cleanup();

        let version_recorded = match self.record_version(package.version.as_deref()) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "version metadata not updated");
                false
            }
        };

        UpdateOutcome::Installed {
            report,
            swap_script,
            version_recorded,
        }
    }

    fn start_helper(&self, script: &Path) {
        let mut command = self.platform.helper_command(script);
        command.current_dir(&self.install_root);
        match self.platform.spawn_detached(&mut command) {
            Ok(pid) => debug!(pid, "launcher swap helper waiting for exit"),
            Err(err) => warn!(
                error = %err,
                helper = %script.display(),
                "could not start swap helper; run it after closing"
            ),
        }
    }
}

fn ensure_object(value: &mut Value) {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
}
