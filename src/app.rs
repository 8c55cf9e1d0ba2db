//! Startup wiring: every capability is chosen once here and handed to the
//! menu and command handlers.

use std::sync::Arc;
use tracing::debug;

use crate::activation::ActivationConfig;
use crate::config::Settings;
use crate::launcher::Launcher;
use crate::platform::{self, PlatformOps};
use crate::process::{introspect, ProcessRegistry};
use crate::style::{self, Reporter};
use crate::update::UpdateInstaller;
use crate::utils::config_paths::EnvPaths;

pub struct AppContext {
    pub paths: EnvPaths,
    pub settings: Settings,
    pub activation: ActivationConfig,
    pub platform: Arc<dyn PlatformOps>,
    pub registry: ProcessRegistry,
    pub reporter: Reporter,
}

impl AppContext {
    /// Detect the environment and open the registry under `paths.root`.
    pub fn bootstrap(paths: EnvPaths, settings: Settings) -> Self {
        let platform = platform::current();
        let introspector = introspect::detect(settings.introspection);
        let activation = ActivationConfig::detect(&paths.root, &settings);
        let registry = ProcessRegistry::open(&paths.registry_file, introspector);
        let reporter = Reporter::new(style::detect());

        debug!(
            root = %paths.root.display(),
            platform = platform.name(),
            activated = activation.is_active(),
            "application context ready"
        );

        Self {
            paths,
            settings,
            activation,
            platform,
            registry,
            reporter,
        }
    }

    /// Split borrow: a launcher over the read-only parts plus the registry.
    pub fn launcher(&mut self) -> (Launcher<'_>, &mut ProcessRegistry) {
        let launcher = Launcher::new(
            &self.paths,
            &self.settings,
            &self.activation,
            self.platform.as_ref(),
        );
        (launcher, &mut self.registry)
    }

    pub fn installer(&self) -> UpdateInstaller {
        UpdateInstaller::new(&self.paths, Arc::clone(&self.platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn bootstrap_starts_with_empty_registry() {
        let dir = TempDir::new().unwrap();
        let paths = EnvPaths::new(dir.path());
        let mut ctx = AppContext::bootstrap(paths, Settings::default());

        assert_eq!(ctx.registry.count(), 0);
        assert_eq!(ctx.registry.path(), dir.path().join("background_processes.json"));
        assert_eq!(
            ctx.installer().backup_root(),
            dir.path().join("backup").as_path()
        );
    }
}
