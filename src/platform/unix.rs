use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

use super::PlatformOps;
use crate::activation::ActivationConfig;
use crate::error::ProcessError;

/// Terminal emulators tried in order when opening a shell.
const TERMINALS: &[&str] = &[
    "x-terminal-emulator",
    "gnome-terminal",
    "konsole",
    "xfce4-terminal",
    "xterm",
];

pub struct UnixPlatform;

impl PlatformOps for UnixPlatform {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn spawn_detached(&self, command: &mut Command) -> io::Result<u32> {
        spawn_detached(command)
    }

    fn open_terminal(&self, dir: &Path, activation: &ActivationConfig) -> io::Result<()> {
        let terminal = TERMINALS
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no terminal emulator found"))?;

        let mut command = Command::new(terminal);
        command.current_dir(dir);
        activation.apply(&mut command);
        spawn_detached(&mut command).map(|_| ())
    }

    fn shell_command(&self, line: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(line);
        command
    }

    fn quote_arg(&self, arg: &str) -> String {
        sh_quote_arg(arg)
    }

    fn launcher_script_name(&self) -> &'static str {
        "run_ai_env.sh"
    }

    fn script_extension(&self) -> &'static str {
        ".sh"
    }

    fn swap_helper_name(&self) -> &'static str {
        "temp_update_script.sh"
    }

    fn launcher_swap_script(&self, owner_pid: u32, launcher: &Path, staged: &Path) -> String {
        sh_swap_script(owner_pid, launcher, staged)
    }

    fn helper_command(&self, script: &Path) -> Command {
        let mut command = Command::new("sh");
        command.arg(script);
        command
    }
}

/// Spawn in a fresh process group with null stdio. A background thread reaps
/// the child so it never lingers as a zombie while the menu keeps running.
pub(super) fn spawn_detached(command: &mut Command) -> io::Result<u32> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);

    let mut child = command.spawn()?;
    let pid = child.id();
    thread::spawn(move || {
        let _ = child.wait();
    });
    debug!(pid, "spawned detached child");
    Ok(pid)
}

pub(super) fn sh_swap_script(owner_pid: u32, launcher: &Path, staged: &Path) -> String {
    let launcher = sh_quote(&launcher.to_string_lossy());
    let staged = sh_quote(&staged.to_string_lossy());
    format!(
        "#!/bin/sh\n\
         while kill -0 {owner_pid} 2>/dev/null; do\n    sleep 1\ndone\n\
         rm -f {launcher}\n\
         mv -f {staged} {launcher}\n\
         chmod +x {launcher}\n\
         rm -f \"$0\"\n"
    )
}

/// Single-quote for POSIX sh.
pub(super) fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Like [`sh_quote`], but words the shell would not split or expand stay bare.
pub(super) fn sh_quote_arg(value: &str) -> String {
    let bare = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if bare {
        value.to_string()
    } else {
        sh_quote(value)
    }
}

/// Check if process is alive
///
/// `kill(pid, 0)` succeeding or failing with EPERM means the PID exists. An
/// exited-but-unreaped child (zombie) is reported as dead.
pub fn process_alive(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };
    match kill(target, None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Request cooperative exit (SIGTERM).
pub fn send_terminate(pid: u32) -> Result<(), ProcessError> {
    send_signal(pid, Signal::SIGTERM)
}

/// Kill outright (SIGKILL).
pub fn send_kill(pid: u32) -> Result<(), ProcessError> {
    send_signal(pid, Signal::SIGKILL)
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    let target = to_pid(pid).ok_or(ProcessError::NoSuchProcess { pid })?;
    kill(target, signal).map_err(|errno| match errno {
        Errno::ESRCH => ProcessError::NoSuchProcess { pid },
        Errno::EPERM => ProcessError::PermissionDenied { pid },
        other => ProcessError::Os {
            pid,
            message: other.desc().to_string(),
        },
    })?;
    debug!(pid, ?signal, "signal delivered");
    Ok(())
}

// Zero and negative values address process groups, never a single process.
fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            // The command name may contain spaces and parens; state follows the last ')'.
            let rest = &stat[stat.rfind(')')? + 1..];
            rest.split_whitespace().next().map(|state| state == "Z")
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(pid: u32) -> bool {
    use sysinfo::{Pid as SysPid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

    let sys_pid = SysPid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system
        .process(sys_pid)
        .map(|process| process.status() == ProcessStatus::Zombie)
        .unwrap_or(false)
}
