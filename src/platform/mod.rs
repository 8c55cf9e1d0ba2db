//! OS-specific operations behind one interface.
//!
//! Everything that differs between operating systems (detaching children,
//! terminals, helper-script dialects) lives behind [`PlatformOps`]. Callers get
//! an implementation once from [`current`] and never branch on the OS name.

use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::activation::ActivationConfig;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "macos")]
pub use macos::MacPlatform;
#[cfg(unix)]
pub use unix::{process_alive, send_kill, send_terminate, UnixPlatform};
#[cfg(windows)]
pub use windows::{process_alive, send_kill, send_terminate, WindowsPlatform};

pub trait PlatformOps: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start `command` without tying its lifetime or stdio to ours.
    /// Returns the child's PID.
    fn spawn_detached(&self, command: &mut Command) -> io::Result<u32>;

    /// Open an interactive terminal in `dir` with `activation` applied.
    fn open_terminal(&self, dir: &Path, activation: &ActivationConfig) -> io::Result<()>;

    fn open_file_manager(&self, dir: &Path) -> io::Result<()> {
        open::that_detached(dir)
    }

    /// A command that runs `line` through the platform shell.
    fn shell_command(&self, line: &str) -> Command;

    /// Quote one argument so the platform shell hands it over unchanged.
    fn quote_arg(&self, arg: &str) -> String;

    /// Join already-split arguments into a line for [`PlatformOps::shell_command`]
    /// that the shell splits back into the same arguments.
    fn command_line(&self, args: &[String]) -> String {
        args.iter()
            .map(|arg| self.quote_arg(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// File name of the launcher script that may be driving this process.
    fn launcher_script_name(&self) -> &'static str;

    /// Extension used by the other top-level operational scripts.
    fn script_extension(&self) -> &'static str;

    /// File name of the one-shot helper that swaps in a staged launcher.
    fn swap_helper_name(&self) -> &'static str;

    /// Body of the helper: wait for `owner_pid` to exit, replace `launcher`
    /// with `staged`, then delete itself.
    fn launcher_swap_script(&self, owner_pid: u32, launcher: &Path, staged: &Path) -> String;

    /// Command that runs a helper script written by [`PlatformOps::launcher_swap_script`].
    fn helper_command(&self, script: &Path) -> Command;
}

/// The implementation for the OS this binary was built for.
pub fn current() -> Arc<dyn PlatformOps> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(MacPlatform)
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Arc::new(UnixPlatform)
    }
    #[cfg(windows)]
    {
        Arc::new(WindowsPlatform)
    }
}
