use std::io;
use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use super::PlatformOps;
use crate::activation::ActivationConfig;
use crate::error::ProcessError;

const DETACHED_PROCESS: u32 = 0x0000_0008;
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

pub struct WindowsPlatform;

impl PlatformOps for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn spawn_detached(&self, command: &mut Command) -> io::Result<u32> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        let child = command.spawn()?;
        debug!(pid = child.id(), "spawned detached child");
        Ok(child.id())
    }

    fn open_terminal(&self, dir: &Path, activation: &ActivationConfig) -> io::Result<()> {
        let mut command = Command::new("cmd");
        command
            .args(["/C", "start", "AI Environment", "cmd", "/K"])
            .current_dir(dir);
        activation.apply(&mut command);
        command.spawn().map(|_| ())
    }

    fn shell_command(&self, line: &str) -> Command {
        let mut command = Command::new("cmd");
        command.arg("/C").raw_arg(line);
        command
    }

    fn quote_arg(&self, arg: &str) -> String {
        cmd_quote_arg(arg)
    }

    fn launcher_script_name(&self) -> &'static str {
        "run_ai_env.bat"
    }

    fn script_extension(&self) -> &'static str {
        ".bat"
    }

    fn swap_helper_name(&self) -> &'static str {
        "temp_update_script.bat"
    }

    fn launcher_swap_script(&self, owner_pid: u32, launcher: &Path, staged: &Path) -> String {
        let launcher = launcher.display();
        let staged = staged.display();
        format!(
            "@echo off\r\n\
             :WAIT_FOR_PROCESS\r\n\
             TASKLIST /FI \"PID eq {owner_pid}\" 2>NUL | FIND \"{owner_pid}\" >NUL\r\n\
             IF %ERRORLEVEL% EQU 0 (\r\n\
             \x20   TIMEOUT /T 1 /NOBREAK >NUL\r\n\
             \x20   GOTO :WAIT_FOR_PROCESS\r\n\
             )\r\n\
             IF EXIST \"{launcher}\" DEL /F /Q \"{launcher}\"\r\n\
             IF EXIST \"{staged}\" MOVE /Y \"{staged}\" \"{launcher}\" >NUL\r\n\
             (GOTO) 2>NUL & DEL \"%~f0\"\r\n"
        )
    }

    fn helper_command(&self, script: &Path) -> Command {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(script);
        command
    }
}

/// Double-quote following the MSVCRT argument rules: backslashes are literal
/// unless they run into a quote.
fn cmd_quote_arg(value: &str) -> String {
    let bare = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || "\"&|<>^()".contains(c));
    if bare {
        return value.to_string();
    }

    let mut quoted = String::from("\"");
    let mut backslashes = 0usize;
    for c in value.chars() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        let escapes = if c == '"' { backslashes * 2 + 1 } else { backslashes };
        quoted.push_str(&"\\".repeat(escapes));
        quoted.push(c);
        backslashes = 0;
    }
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

pub fn process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system.process(sys_pid).is_some()
}

pub fn send_terminate(pid: u32) -> Result<(), ProcessError> {
    taskkill(pid, false)
}

pub fn send_kill(pid: u32) -> Result<(), ProcessError> {
    taskkill(pid, true)
}

fn taskkill(pid: u32, force: bool) -> Result<(), ProcessError> {
    if !process_alive(pid) {
        return Err(ProcessError::NoSuchProcess { pid });
    }

    let mut command = Command::new("taskkill");
    if force {
        command.arg("/F");
    }
    let pid_arg = pid.to_string();
    let output = command
        .args(["/PID", pid_arg.as_str()])
        .output()
        .map_err(|err| ProcessError::Os {
            pid,
            message: err.to_string(),
        })?;

    if output.status.success() {
        return Ok(());
    }
    if !process_alive(pid) {
        return Err(ProcessError::NoSuchProcess { pid });
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("Access is denied") {
        Err(ProcessError::PermissionDenied { pid })
    } else {
        Err(ProcessError::Os {
            pid,
            message: stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_follows_msvcrt_rules() {
        assert_eq!(cmd_quote_arg("train.py"), "train.py");
        assert_eq!(cmd_quote_arg("a b"), "\"a b\"");
        assert_eq!(cmd_quote_arg(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(
            cmd_quote_arg(r"C:\dir with space\"),
            r#""C:\dir with space\\""#
        );
    }
}
