//! Interactive main menu.
//!
//! Each entry is a [`MenuCommand`]; [`MenuCommand::handler`] maps it to the
//! function that runs it. Handler errors are reported and the loop continues.
//! Ctrl-C during an action only cancels that action.

use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::io;
use tracing::{debug, warn};

use crate::app::AppContext;
use crate::commands::{launch, processes, update};
use crate::error::{AienvError, AienvResult};
use crate::launcher::AppKind;
use crate::signal;
use crate::update as updates;
use crate::utils::version::BuildInfo;

/// What the loop does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub type Handler = fn(&mut AppContext) -> AienvResult<Flow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuCommand {
    LaunchApplications,
    BackgroundProcesses,
    StartLlmServer,
    OpenTerminal,
    OpenFileManager,
    UpdateSystem,
    UpdateInfo,
    About,
    Quit,
    ExitAndCloseAll,
}

impl MenuCommand {
    pub const ALL: [MenuCommand; 10] = [
        MenuCommand::LaunchApplications,
        MenuCommand::BackgroundProcesses,
        MenuCommand::StartLlmServer,
        MenuCommand::OpenTerminal,
        MenuCommand::OpenFileManager,
        MenuCommand::UpdateSystem,
        MenuCommand::UpdateInfo,
        MenuCommand::About,
        MenuCommand::Quit,
        MenuCommand::ExitAndCloseAll,
    ];

    /// `running` feeds the process count badge.
    pub fn label(self, running: usize) -> String {
        match self {
            MenuCommand::LaunchApplications => "Launch Applications".to_string(),
            MenuCommand::BackgroundProcesses => processes::menu_label(running),
            MenuCommand::StartLlmServer => "Start Ollama Server".to_string(),
            MenuCommand::OpenTerminal => "Open Terminal (environment activated)".to_string(),
            MenuCommand::OpenFileManager => "Open Installation Folder".to_string(),
            MenuCommand::UpdateSystem => "Update AI Environment".to_string(),
            MenuCommand::UpdateInfo => "Update Information".to_string(),
            MenuCommand::About => "About".to_string(),
            MenuCommand::Quit => "Quit (leave processes running)".to_string(),
            MenuCommand::ExitAndCloseAll => "Exit and close all processes".to_string(),
        }
    }

    pub fn handler(self) -> Handler {
        match self {
            MenuCommand::LaunchApplications => launch_applications,
            MenuCommand::BackgroundProcesses => background_processes,
            MenuCommand::StartLlmServer => start_llm_server,
            MenuCommand::OpenTerminal => open_terminal,
            MenuCommand::OpenFileManager => open_file_manager,
            MenuCommand::UpdateSystem => update_system,
            MenuCommand::UpdateInfo => update_info,
            MenuCommand::About => about,
            MenuCommand::Quit => quit,
            MenuCommand::ExitAndCloseAll => exit_and_close_all,
        }
    }
}

/// Run the main menu until the operator quits.
pub fn run(ctx: &mut AppContext) -> AienvResult<()> {
    let theme = ColorfulTheme::default();
    loop {
        let running = ctx.registry.count();
        let labels: Vec<String> = MenuCommand::ALL
            .iter()
            .map(|command| command.label(running))
            .collect();

        ctx.reporter.heading(&format!(
            "AI Environment - {}",
            ctx.settings.environment_name
        ));
        let choice = pick(
            Select::with_theme(&theme)
                .with_prompt("Select an option")
                .items(&labels)
                .default(0),
        )?;

        let Some(index) = choice else {
            // Esc or Ctrl-C at the top level behaves like Quit.
            return Ok(());
        };
        let command = MenuCommand::ALL[index];
        debug!(?command, "menu selection");

        signal::take_interrupt();
        let result = (command.handler())(ctx);
        if signal::take_interrupt() {
            ctx.reporter.warning("Operation cancelled");
        }
        match result {
            Ok(Flow::Exit) => return Ok(()),
            Ok(Flow::Continue) => {}
            Err(err) => {
                warn!(category = err.category().display_name(), error = %err, "menu action failed");
                ctx.reporter.error(err.user_message());
            }
        }
    }
}

/// Ctrl-C at a prompt reads as cancel (`None`). Any other failure means the
/// terminal is unusable.
pub(crate) fn answered<T>(result: Result<T, dialoguer::Error>) -> AienvResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(dialoguer::Error::IO(err)) if err.kind() == io::ErrorKind::Interrupted => {
            signal::note_interrupt();
            Ok(None)
        }
        Err(err) => Err(AienvError::interface(err.to_string())),
    }
}

fn pick(select: Select<'_>) -> AienvResult<Option<usize>> {
    Ok(answered(select.interact_opt())?.flatten())
}

fn launch_applications(ctx: &mut AppContext) -> AienvResult<Flow> {
    let mut labels: Vec<String> = AppKind::ALL.iter().map(|app| app.label().to_string()).collect();
    labels.push("Custom command".to_string());
    labels.push("Back".to_string());

    let choice = pick(
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Launch which application?")
            .items(&labels)
            .default(0),
    )?;

    match choice {
        Some(index) if index < AppKind::ALL.len() => {
            launch::run(ctx, AppKind::ALL[index], true)?;
        }
        Some(index) if index == AppKind::ALL.len() => {
            let Some(name) = answered(
                Input::<String>::new()
                    .with_prompt("Display name")
                    .default("Custom Process".to_string())
                    .interact_text(),
            )?
            else {
                return Ok(Flow::Continue);
            };
            let Some(command) = answered(
                Input::<String>::new()
                    .with_prompt("Command line")
                    .interact_text(),
            )?
            else {
                return Ok(Flow::Continue);
            };
            launch::run_custom(ctx, &name, &command)?;
        }
        _ => {}
    }
    Ok(Flow::Continue)
}

fn background_processes(ctx: &mut AppContext) -> AienvResult<Flow> {
    loop {
        if processes::print_list(ctx) == 0 {
            return Ok(Flow::Continue);
        }
        println!();

        let items = ["Stop a process", "Stop all processes", "Refresh", "Back"];
        let choice = pick(
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Process actions")
                .items(&items)
                .default(3),
        )?;

        match choice {
            Some(0) => stop_one(ctx)?,
            Some(1) => {
                if update::confirm("Stop every background process?", false)? {
                    processes::stop_all(ctx);
                }
            }
            Some(2) => continue,
            _ => return Ok(Flow::Continue),
        }
    }
}

fn stop_one(ctx: &mut AppContext) -> AienvResult<()> {
    let views = ctx.registry.list();
    if views.is_empty() {
        ctx.reporter.info("No background processes to stop");
        return Ok(());
    }
    let labels: Vec<String> = views
        .iter()
        .map(|view| format!("{} - {} (PID {})", view.id, view.record.name, view.record.pid))
        .collect();

    let choice = pick(
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Stop which process?")
            .items(&labels)
            .default(0),
    )?;
    if let Some(index) = choice {
        processes::stop(ctx, &views[index].id);
    }
    Ok(())
}

fn start_llm_server(ctx: &mut AppContext) -> AienvResult<Flow> {
    launch::run(ctx, AppKind::LlmServer, false)?;
    Ok(Flow::Continue)
}

fn open_terminal(ctx: &mut AppContext) -> AienvResult<Flow> {
    launch::open_terminal(ctx)?;
    Ok(Flow::Continue)
}

fn open_file_manager(ctx: &mut AppContext) -> AienvResult<Flow> {
    launch::open_file_manager(ctx)?;
    Ok(Flow::Continue)
}

fn update_system(ctx: &mut AppContext) -> AienvResult<Flow> {
    let packages = updates::scan(&ctx.paths.drop_dir);
    if packages.is_empty() {
        update::print_packages(ctx);
        return Ok(Flow::Continue);
    }

    let mut labels: Vec<String> = packages.iter().map(update::package_label).collect();
    labels.push("Cancel".to_string());
    let choice = pick(
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select update to install")
            .items(&labels)
            .default(0),
    )?;

    // Menu positions are 0-based; `select` takes the 1-based choice with 0 as cancel.
    let position = match choice {
        Some(index) if index < packages.len() => index + 1,
        _ => 0,
    };
    match updates::select(&packages, position) {
        Some(package) => {
            update::install(ctx, package, false)?;
        }
        None => ctx.reporter.info("Update cancelled."),
    }
    Ok(Flow::Continue)
}

fn update_info(ctx: &mut AppContext) -> AienvResult<Flow> {
    update::show_info(ctx);
    Ok(Flow::Continue)
}

fn about(ctx: &mut AppContext) -> AienvResult<Flow> {
    ctx.reporter.heading("About");
    for line in BuildInfo::get().lines() {
        println!("{}", line);
    }
    println!("Installation root: {}", ctx.paths.root.display());
    println!("Platform: {}", ctx.platform.name());
    println!("Process statistics: {}", ctx.registry.introspector().name());
    match &ctx.activation.env_prefix {
        Some(prefix) => println!("Environment: {}", prefix.display()),
        None => println!("Environment: not found (using inherited PATH)"),
    }
    Ok(Flow::Continue)
}

fn quit(ctx: &mut AppContext) -> AienvResult<Flow> {
    let running = ctx.registry.count();
    if running > 0 {
        ctx.reporter.info(format!(
            "{} background processes keep running. Use 'aienv ps stop-all' to close them later.",
            running
        ));
    }
    Ok(Flow::Exit)
}

fn exit_and_close_all(ctx: &mut AppContext) -> AienvResult<Flow> {
    processes::stop_all(ctx);
    Ok(Flow::Exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::ErrorCategory;
    use crate::utils::config_paths::EnvPaths;
    use serial_test::serial;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn ctrl_c_at_a_prompt_cancels_instead_of_failing() {
        signal::take_interrupt();
        let interrupted = dialoguer::Error::IO(io::Error::new(
            io::ErrorKind::Interrupted,
            "read interrupted",
        ));
        assert_eq!(answered::<usize>(Err(interrupted)).unwrap(), None);
        assert!(signal::take_interrupt());

        let gone = dialoguer::Error::IO(io::Error::new(io::ErrorKind::BrokenPipe, "not a terminal"));
        let err = answered::<usize>(Err(gone)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Interface);
        assert!(!signal::take_interrupt());

        assert_eq!(answered(Ok(2usize)).unwrap(), Some(2));
    }

    #[test]
    fn every_command_has_a_distinct_label() {
        let labels: HashSet<String> = MenuCommand::ALL.iter().map(|c| c.label(0)).collect();
        assert_eq!(labels.len(), MenuCommand::ALL.len());
    }

    #[test]
    fn process_entry_shows_count() {
        assert_eq!(
            MenuCommand::BackgroundProcesses.label(3),
            "Background Processes (3 running)"
        );
    }

    #[test]
    fn quit_and_close_all_end_the_loop() {
        let dir = TempDir::new().unwrap();
        let mut ctx = AppContext::bootstrap(EnvPaths::new(dir.path()), Settings::default());

        assert_eq!((MenuCommand::Quit.handler())(&mut ctx).unwrap(), Flow::Exit);
        assert_eq!(
            (MenuCommand::ExitAndCloseAll.handler())(&mut ctx).unwrap(),
            Flow::Exit
        );
        assert_eq!((MenuCommand::About.handler())(&mut ctx).unwrap(), Flow::Continue);
    }
}
