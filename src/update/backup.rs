//! Point-in-time copy of the critical installation paths.

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{UpdateError, UpdateResult};

/// Replace any previous backup with a fresh copy of `critical_paths`.
/// Missing paths are skipped. Returns how many were copied.
pub fn backup(install_root: &Path, backup_root: &Path, critical_paths: &[String]) -> UpdateResult<usize> {
    if backup_root.exists() {
        remove_path(backup_root).map_err(|e| UpdateError::io(backup_root, e))?;
    }
    fs::create_dir_all(backup_root).map_err(|e| UpdateError::io(backup_root, e))?;

    let mut copied = 0;
    for item in critical_paths {
        let source = install_root.join(item);
        if !source.exists() {
            debug!(item = %item, "not present; nothing to back up");
            continue;
        }
        copy_path(&source, &backup_root.join(item))?;
        copied += 1;
    }

    info!(copied, backup = %backup_root.display(), "backup created");
    Ok(copied)
}

/// Put every backed-up entry back, replacing whatever is live.
pub fn restore(install_root: &Path, backup_root: &Path) -> UpdateResult<usize> {
    let entries = fs::read_dir(backup_root).map_err(|e| UpdateError::io(backup_root, e))?;

    let mut restored = 0;
    for entry in entries {
        let entry = entry.map_err(|e| UpdateError::io(backup_root, e))?;
        let dest = install_root.join(entry.file_name());

        if dest.symlink_metadata().is_ok() {
            remove_path(&dest).map_err(|e| UpdateError::io(&dest, e))?;
        }
        copy_path(&entry.path(), &dest)?;
        restored += 1;
    }

    info!(restored, "installation restored from backup");
    Ok(restored)
}

/// Delete the backup tree. Best effort.
pub fn cleanup(backup_root: &Path) {
    if !backup_root.exists() {
        return;
    }
    if let Err(err) = fs::remove_dir_all(backup_root) {
        warn!(backup = %backup_root.display(), error = %err, "could not remove backup");
    }
}

/// Copy a file or a whole directory tree to `dest`, creating parents.
pub(crate) fn copy_path(source: &Path, dest: &Path) -> UpdateResult<()> {
    if source.is_dir() {
        return copy_tree(source, dest);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| UpdateError::io(parent, e))?;
    }
    fs::copy(source, dest).map_err(|e| UpdateError::io(source, e))?;
    Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> UpdateResult<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            UpdateError::io(path, io::Error::other(e.to_string()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| UpdateError::io(entry.path(), io::Error::other(e.to_string())))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| UpdateError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| UpdateError::io(entry.path(), e))?;
        }
    }
    Ok(())
}

/// Remove a file, symlink or directory tree.
pub(crate) fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = path.symlink_metadata()?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
