//! AIENV Library
//!
//! Workstation AI development environment manager: launches notebook servers,
//! dashboards and a local LLM server in the background, tracks them in a JSON
//! registry, and installs updates dropped into the `new_versions` folder with
//! backup and rollback.

pub mod activation;
pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod launcher;
pub mod menu;
pub mod platform;
pub mod process;
pub mod signal;
pub mod style;
pub mod update;
pub mod utils;

// Re-export commonly used types for convenience
pub use activation::ActivationConfig;
pub use app::AppContext;
pub use config::Settings;
pub use error::{AienvError, AienvResult, ErrorCategory};
pub use process::{ProcessRecord, ProcessRegistry, StopOutcome};
pub use update::{UpdateInstaller, UpdateOutcome, UpdatePackage};
pub use utils::config_paths::EnvPaths;
