use aienv::commands::{self, Cli, Commands};
use aienv::config::Settings;
use aienv::utils::config_paths::EnvPaths;
use aienv::utils::logger::init_logger;
use aienv::{menu, signal, AppContext};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match EnvPaths::resolve(cli.root.as_deref()) {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("[ERROR] Cannot determine installation root: {}", err);
            return ExitCode::from(2);
        }
    };
    let settings = Settings::load_or_default(&paths.settings_file);

    // 初始化日志系统
    let level = cli.log_level.as_deref().or(settings.log_level.as_deref());
    if let Err(err) = paths
        .ensure_dirs()
        .and_then(|()| init_logger(level, Some(paths.log_file.clone())))
    {
        eprintln!("[WARNING] Logging to file disabled: {}", err);
        let _ = init_logger(level, None);
    }

    if let Err(err) = signal::install() {
        tracing::warn!(error = %err, "interrupt handler not installed");
    }

    let mut ctx = AppContext::bootstrap(paths, settings);
    let result = match cli.command {
        None | Some(Commands::Menu) => menu::run(&mut ctx),
        Some(command) => commands::dispatch(&mut ctx, command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(category = err.category().display_name(), error = %err, "command failed");
            ctx.reporter.error(err.user_message());
            ExitCode::from(1)
        }
    }
}
