use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::update::archive::ArchiveKind;

/// Tried in order, first match wins. The first pattern also matches `_v`
/// names; the second is kept for parity with older drop-folder conventions.
static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)v(\d+\.\d+\.\d+)",
        r"(?i)_v(\d+\.\d+\.\d+)",
        r"(\d+\.\d+\.\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("version pattern is valid"))
    .collect()
});

/// An archive sitting in the drop folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePackage {
    pub path: PathBuf,
    pub name: String,
    pub version: Option<String>,
    pub size: u64,
}

impl UpdatePackage {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            version: parse_version(&name),
            name,
            size: metadata.len(),
        })
    }

    pub fn size_display(&self) -> String {
        let mb = self.size as f64 / (1024.0 * 1024.0);
        if mb >= 1.0 {
            format!("{:.1} MB", mb)
        } else {
            format!("{:.1} KB", self.size as f64 / 1024.0)
        }
    }

    /// Display and selection order: `(version or "", name)`. Version strings
    /// compare lexicographically, so "10.0.0" sorts before "2.0.0".
    fn sort_key(&self) -> (&str, &str) {
        (self.version.as_deref().unwrap_or(""), self.name.as_str())
    }
}

pub fn parse_version(file_name: &str) -> Option<String> {
    VERSION_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(file_name)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().to_string())
    })
}

/// Archives directly inside `drop_folder`, sorted for display. Read-only; a
/// missing or unreadable folder yields an empty list.
pub fn scan(drop_folder: &Path) -> Vec<UpdatePackage> {
    let entries = match fs::read_dir(drop_folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(folder = %drop_folder.display(), error = %err, "cannot scan drop folder");
            return Vec::new();
        }
    };

    let mut packages: Vec<UpdatePackage> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ArchiveKind::from_path(path).is_some())
        .filter_map(|path| match UpdatePackage::from_path(&path) {
            Ok(package) => Some(package),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping unreadable archive");
                None
            }
        })
        .collect();

    packages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    packages
}

/// Menu contract: `choice` is 1-based, `0` cancels, anything past the end is
/// treated as no selection.
pub fn select(packages: &[UpdatePackage], choice: usize) -> Option<&UpdatePackage> {
    choice.checked_sub(1).and_then(|index| packages.get(index))
}
