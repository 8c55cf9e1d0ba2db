//! Unified error handling for aienv
//!
//! Each concern owns a narrow `thiserror` enum. `AienvError` wraps them for the
//! menu and CLI layers, which only need a category and an operator-facing line.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AienvError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Filesystem errors outside the update flow
    #[error("Filesystem error: {message} (path: {path})")]
    Filesystem {
        message: String,
        path: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Interactive prompt failures (terminal gone, not a tty)
    #[error("Interface error: {message}")]
    Interface { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl AienvError {
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AienvError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn filesystem(message: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        AienvError::Filesystem {
            message: message.into(),
            path: path.into().display().to_string(),
            source: Some(source),
        }
    }

    pub fn interface(message: impl Into<String>) -> Self {
        AienvError::Interface {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AienvError::Validation {
            message: message.into(),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            AienvError::Config { .. } => ErrorCategory::Config,
            AienvError::Registry(_) | AienvError::Process(_) => ErrorCategory::Process,
            AienvError::Update(_) => ErrorCategory::Update,
            AienvError::Launch(_) => ErrorCategory::Launch,
            AienvError::Filesystem { .. } => ErrorCategory::Filesystem,
            AienvError::Interface { .. } => ErrorCategory::Interface,
            AienvError::Validation { .. } => ErrorCategory::Validation,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AienvError::Config { message, .. } => {
                format!("Configuration problem: {}", message)
            }
            AienvError::Registry(err) => format!("Process tracking: {}", err),
            AienvError::Process(err) => format!("Process control: {}", err),
            AienvError::Update(err) => err.user_message(),
            AienvError::Launch(err) => err.to_string(),
            AienvError::Filesystem { message, path, .. } => {
                format!("File operation failed for {}: {}", path, message)
            }
            AienvError::Interface { message } => {
                format!("Interactive prompt unavailable: {}", message)
            }
            AienvError::Validation { message } => format!("Invalid input: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Process,
    Update,
    Launch,
    Filesystem,
    Interface,
    Validation,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "Configuration",
            ErrorCategory::Process => "Process",
            ErrorCategory::Update => "Update",
            ErrorCategory::Launch => "Launch",
            ErrorCategory::Filesystem => "Filesystem",
            ErrorCategory::Interface => "Interface",
            ErrorCategory::Validation => "Validation",
        }
    }
}

/// Registry-level refusals. Persistence failures never show up here; they are
/// logged and swallowed by the registry itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("process {pid} is not running; refusing to track '{id}'")]
    ProcessNotRunning { id: String, pid: u32 },
}

/// Failures of a single OS-level process operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("no such process: {pid}")]
    NoSuchProcess { pid: u32 },
    #[error("permission denied for process {pid}")]
    PermissionDenied { pid: u32 },
    #[error("operating system error for process {pid}: {message}")]
    Os { pid: u32, message: String },
}

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid update package: {reason}")]
    InvalidPackage { reason: String },
    #[error("failed to extract {archive}: {message}")]
    Archive { archive: PathBuf, message: String },
    #[error("version metadata file missing: {path}")]
    MetadataMissing { path: PathBuf },
    #[error("version metadata is malformed: {message}")]
    MetadataFormat { message: String },
}

impl UpdateError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        UpdateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        UpdateError::InvalidPackage {
            reason: reason.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            UpdateError::Io { path, source } => {
                format!("Could not access {}: {}", path.display(), source)
            }
            UpdateError::InvalidPackage { reason } => {
                format!("The selected archive is not a valid update package: {}", reason)
            }
            UpdateError::Archive { archive, message } => {
                format!("Unable to unpack {}: {}", archive.display(), message)
            }
            UpdateError::MetadataMissing { path } => {
                format!("Version file {} not found; version not recorded", path.display())
            }
            UpdateError::MetadataFormat { message } => {
                format!("Version file is not valid JSON: {}", message)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("'{program}' was not found in the activated environment or PATH")]
    ProgramNotFound { program: String },
    #[error("failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{name} started but could not be tracked: {source}")]
    Registration {
        name: String,
        #[source]
        source: RegistryError,
    },
    #[error("{name} is already answering on port {port}")]
    AlreadyRunning { name: String, port: u16 },
    #[error("failed to prepare {name}: {message}")]
    Prepare { name: String, message: String },
}

pub type AienvResult<T> = Result<T, AienvError>;
pub type UpdateResult<T> = Result<T, UpdateError>;
