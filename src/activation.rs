//! Toolchain activation as a value.
//!
//! Activating a conda environment means three things for a child process: a
//! search path with the environment's binaries first, `CONDA_DEFAULT_ENV` and
//! `CONDA_PREFIX`. [`ActivationConfig`] carries exactly that and is applied to
//! each [`Command`] we build. The host process environment is never touched.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::config::Settings;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationConfig {
    /// Active environment name; `None` when nothing was found
    pub env_name: Option<String>,
    /// Root of the active environment (`<conda>/envs/<name>`)
    pub env_prefix: Option<PathBuf>,
    /// Directories prepended to the inherited `PATH`, highest priority first
    pub search_paths: Vec<PathBuf>,
    /// Python interpreter inside the environment, if present
    pub interpreter: Option<PathBuf>,
}

impl ActivationConfig {
    /// No activation: children inherit our environment unchanged.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Activation for `env_name` inside the conda installation at `conda_root`.
    pub fn for_conda(conda_root: &Path, env_name: &str) -> Self {
        let env_prefix = conda_root.join("envs").join(env_name);

        #[cfg(windows)]
        let (search_paths, interpreter) = (
            vec![
                env_prefix.clone(),
                env_prefix.join("Scripts"),
                env_prefix.join("Library").join("bin"),
                conda_root.to_path_buf(),
                conda_root.join("Scripts"),
                conda_root.join("condabin"),
            ],
            env_prefix.join("python.exe"),
        );
        #[cfg(not(windows))]
        let (search_paths, interpreter) = (
            vec![
                env_prefix.join("bin"),
                conda_root.join("bin"),
                conda_root.join("condabin"),
            ],
            env_prefix.join("bin").join("python"),
        );

        Self {
            env_name: Some(env_name.to_string()),
            interpreter: interpreter.is_file().then_some(interpreter),
            env_prefix: Some(env_prefix),
            search_paths,
        }
    }

    /// Locate a conda installation holding `settings.environment_name`.
    ///
    /// Candidates in order: the configured root, a portable install under the
    /// installation root, the usual per-user and system locations, and finally
    /// whatever `conda` resolves to on `PATH`.
    pub fn detect(install_root: &Path, settings: &Settings) -> Self {
        let env_name = settings.environment_name.as_str();

        let mut candidates: Vec<PathBuf> = Vec::new();
        candidates.extend(settings.conda_root_path());
        candidates.push(install_root.join("Miniconda"));
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join("miniconda3"));
            candidates.push(home.join("anaconda3"));
        }
        #[cfg(not(windows))]
        {
            candidates.push(PathBuf::from("/opt/miniconda3"));
            candidates.push(PathBuf::from("/opt/anaconda3"));
        }
        if let Ok(conda) = which::which("conda") {
            // <root>/bin/conda or <root>/condabin/conda
            if let Some(root) = conda.parent().and_then(Path::parent) {
                candidates.push(root.to_path_buf());
            }
        }

        for root in candidates {
            if root.join("envs").join(env_name).is_dir() {
                info!(conda_root = %root.display(), env = env_name, "environment located");
                return Self::for_conda(&root, env_name);
            }
            debug!(candidate = %root.display(), "no environment here");
        }

        info!(env = env_name, "environment not found; launching with inherited PATH");
        Self::inactive()
    }

    pub fn is_active(&self) -> bool {
        self.env_name.is_some()
    }

    /// Activation search paths followed by the inherited `PATH`.
    pub fn joined_path(&self) -> Option<OsString> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let paths = self
            .search_paths
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(paths).ok()
    }

    /// Variables a child needs to see. Empty when inactive.
    pub fn env_overrides(&self) -> Vec<(&'static str, OsString)> {
        let mut vars = Vec::new();
        if !self.is_active() {
            return vars;
        }
        if let Some(path) = self.joined_path() {
            vars.push(("PATH", path));
        }
        if let Some(name) = &self.env_name {
            vars.push(("CONDA_DEFAULT_ENV", OsString::from(name)));
        }
        if let Some(prefix) = &self.env_prefix {
            vars.push(("CONDA_PREFIX", prefix.clone().into_os_string()));
        }
        vars
    }

    /// Materialise the activation into a child launch configuration.
    pub fn apply(&self, command: &mut Command) {
        for (key, value) in self.env_overrides() {
            command.env(key, value);
        }
    }

    /// Resolve `program` against the activated search path, falling back to
    /// the inherited `PATH`.
    pub fn resolve_program(&self, program: impl AsRef<OsStr>) -> Option<PathBuf> {
        let program = program.as_ref();
        let cwd = std::env::current_dir().ok()?;
        match self.joined_path() {
            Some(path) => which::which_in(program, Some(path), cwd).ok(),
            None => which::which(program).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn fake_conda(root: &Path, env: &str) {
        fs::create_dir_all(root.join("envs").join(env).join("bin")).unwrap();
        fs::create_dir_all(root.join("condabin")).unwrap();
    }

    #[test]
    fn inactive_has_no_overrides() {
        let activation = ActivationConfig::inactive();
        assert!(!activation.is_active());
        assert!(activation.env_overrides().is_empty());
    }

    #[test]
    fn detect_prefers_configured_root() {
        let dir = TempDir::new().unwrap();
        let conda = dir.path().join("conda");
        fake_conda(&conda, "AI2025");

        let settings = Settings {
            conda_root: Some(conda.display().to_string()),
            ..Settings::default()
        };
        let activation = ActivationConfig::detect(dir.path(), &settings);

        assert_eq!(activation.env_name.as_deref(), Some("AI2025"));
        assert_eq!(activation.env_prefix, Some(conda.join("envs").join("AI2025")));
        assert_eq!(activation.search_paths[0], conda.join("envs").join("AI2025").join("bin"));
    }

    #[test]
    fn detect_finds_portable_install() {
        let dir = TempDir::new().unwrap();
        fake_conda(&dir.path().join("Miniconda"), "AI2025");

        let activation = ActivationConfig::detect(dir.path(), &Settings::default());
        assert!(activation.is_active());
    }

    #[test]
    fn overrides_put_env_bin_first() {
        let activation = ActivationConfig::for_conda(Path::new("/opt/c"), "ml");
        let overrides = activation.env_overrides();

        let path = overrides
            .iter()
            .find(|(key, _)| *key == "PATH")
            .map(|(_, value)| value.clone())
            .unwrap();
        let first = std::env::split_paths(&path).next().unwrap();
        assert_eq!(first, activation.search_paths[0]);
        assert!(overrides
            .iter()
            .any(|(key, value)| *key == "CONDA_DEFAULT_ENV" && value == "ml"));
    }

    #[cfg(unix)]
    #[test]
    fn apply_sets_child_env_only() {
        let activation = ActivationConfig::for_conda(Path::new("/opt/c"), "ml");
        let mut command = Command::new("sh");
        command.arg("-c").arg("printf %s \"$CONDA_DEFAULT_ENV\"");
        activation.apply(&mut command);

        let output = command.output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "ml");
        assert_ne!(std::env::var("CONDA_DEFAULT_ENV").ok().as_deref(), Some("ml"));
    }
}
