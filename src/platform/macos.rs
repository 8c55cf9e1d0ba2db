use std::io;
use std::path::Path;
use std::process::Command;

use super::unix::{sh_quote, sh_quote_arg, sh_swap_script, spawn_detached};
use super::PlatformOps;
use crate::activation::ActivationConfig;

/// Terminal.app is started by launchd, so the activation has to travel inside
/// the script it runs rather than through the child environment.
pub struct MacPlatform;

impl PlatformOps for MacPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn spawn_detached(&self, command: &mut Command) -> io::Result<u32> {
        spawn_detached(command)
    }

    fn open_terminal(&self, dir: &Path, activation: &ActivationConfig) -> io::Result<()> {
        let mut line = format!("cd {}", sh_quote(&dir.to_string_lossy()));
        for (key, value) in activation.env_overrides() {
            line.push_str(&format!(
                " && export {}={}",
                key,
                sh_quote(&value.to_string_lossy())
            ));
        }
        let script = format!(
            "tell application \"Terminal\" to do script \"{}\"",
            applescript_escape(&line)
        );

        let mut command = Command::new("osascript");
        command.arg("-e").arg(script);
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

fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
