//! Fixed names, bounded waits and the layered `Settings`.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AienvError, AienvResult};
use crate::utils::env::expand_path;

pub const REGISTRY_FILE_NAME: &str = "background_processes.json";
pub const DROP_DIR_NAME: &str = "new_versions";
pub const BACKUP_DIR_NAME: &str = "backup";
pub const VERSION_FILE_NAME: &str = "version_config.json";
pub const SETTINGS_FILE_NAME: &str = "aienv.toml";
pub const PROJECTS_DIR_NAME: &str = "Projects";
pub const MODELS_DIR_NAME: &str = "Models";
/// Top-level folder every update archive must contain.
pub const INSTALL_ROOT_FOLDER: &str = "AI_Environment";
pub const STAGED_SUFFIX: &str = ".new";

pub const ROOT_ENV: &str = "AIENV_ROOT";
pub const SETTINGS_ENV_PREFIX: &str = "AIENV";
pub const RUNTIME_DIR_NAME: &str = ".aienv";
pub const LOG_FILE_NAME: &str = "aienv.log";

pub const DEFAULT_STATUS: &str = "running";
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const ID_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const LLM_SERVER_ID: &str = "ollama_server";
pub const LLM_MODELS_ENV: &str = "OLLAMA_MODELS";
pub const STREAMLIT_DEMO_FILE: &str = "streamlit_demo.py";
pub const EDITOR_DEFAULT_PROJECT: &str = "01_Basic_LLM_Example";
pub const EDITOR_ENTRY_FILE: &str = "main.py";

pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);
pub const FORCE_STOP_TIMEOUT: Duration = Duration::from_secs(3);
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Whether live process statistics are queried at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntrospectionMode {
    #[default]
    Auto,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ports {
    pub jupyter: u16,
    pub streamlit: u16,
    pub tensorboard: u16,
    pub mlflow: u16,
    pub llm_server: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            jupyter: 8888,
            streamlit: 8501,
            tensorboard: 6006,
            mlflow: 5000,
            llm_server: 11434,
        }
    }
}

/// Operator-tunable settings.
///
/// Layering: struct defaults, then `<root>/config/aienv.toml`, then
/// `AIENV_*` environment variables (`AIENV_PORTS__JUPYTER=9999`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Conda environment activated for launched tools
    pub environment_name: String,
    /// Explicit conda installation; autodetected when unset
    pub conda_root: Option<String>,
    pub llm_server_binary: String,
    /// Editor CLI, resolved inside the activated environment first
    pub editor_binary: String,
    pub ports: Ports,
    pub readiness_checks: u32,
    pub readiness_interval_secs: u64,
    pub introspection: IntrospectionMode,
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment_name: "AI2025".to_string(),
            conda_root: None,
            llm_server_binary: "ollama".to_string(),
            editor_binary: "code".to_string(),
            ports: Ports::default(),
            readiness_checks: 15,
            readiness_interval_secs: 1,
            introspection: IntrospectionMode::Auto,
            log_level: None,
        }
    }
}

impl Settings {
    /// Load settings from the optional file plus environment overrides.
    pub fn load(settings_file: &Path) -> AienvResult<Self> {
        let defaults = Config::try_from(&Settings::default())
            .map_err(|e| AienvError::config_with_source("failed to seed defaults", e))?;

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(settings_file).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(SETTINGS_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                AienvError::config_with_source(
                    format!("failed to read {}", settings_file.display()),
                    e,
                )
            })?;

        settings
            .try_deserialize()
            .map_err(|e| AienvError::config_with_source("invalid settings", e))
    }

    /// Like [`Settings::load`] but never fails: a broken file is reported once
    /// and defaults are used so the menu can still start.
    pub fn load_or_default(settings_file: &Path) -> Self {
        match Self::load(settings_file) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("{}; falling back to default settings", err.user_message());
                Self::default()
            }
        }
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_secs)
    }

    pub fn conda_root_path(&self) -> Option<PathBuf> {
        self.conda_root.as_deref().map(expand_path)
    }
}
