//! Drop-folder self-update.

pub mod archive;
pub mod backup;
pub mod installer;
pub mod package;

pub use archive::ArchiveKind;
pub use installer::{InstallReport, UpdateInstaller, UpdateLayout, UpdateOutcome};
pub use package::{parse_version, scan, select, UpdatePackage};
