//! CLI 命令处理模块
//!
//! 子命令与交互式菜单共用同一组处理函数

pub mod launch;
pub mod parser;
pub mod processes;
pub mod update;

// Re-exports (used by main.rs)
pub use parser::*;

use crate::app::AppContext;
use crate::error::{AienvError, AienvResult};
use crate::update as updates;
use crate::utils::version::BuildInfo;

/// Run a non-interactive subcommand. `Menu` is handled by the caller.
pub fn dispatch(ctx: &mut AppContext, command: Commands) -> AienvResult<()> {
    match command {
        Commands::Menu => Err(AienvError::validation("the menu is not a one-shot command")),
        Commands::Ps(action) => dispatch_ps(ctx, action),
        Commands::Launch { app, open } => launch::run(ctx, app, open).map(|_| ()),
        Commands::Run { name, command } => {
            let line = ctx.platform.command_line(&command);
            launch::run_custom(ctx, &name, &line).map(|_| ())
        }
        Commands::Update(action) => dispatch_update(ctx, action),
        Commands::Version => {
            for line in BuildInfo::get().lines() {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn dispatch_ps(ctx: &mut AppContext, action: PsAction) -> AienvResult<()> {
    match action {
        PsAction::List => {
            processes::print_list(ctx);
            Ok(())
        }
        PsAction::Stop { id } => {
            if processes::stop(ctx, &id) {
                Ok(())
            } else {
                Err(AienvError::validation(format!("process '{}' was not stopped cleanly", id)))
            }
        }
        PsAction::StopAll => {
            let summary = processes::stop_all(ctx);
            if summary.succeeded == summary.attempted {
                Ok(())
            } else {
                Err(AienvError::validation(format!(
                    "{} of {} processes were not stopped cleanly",
                    summary.attempted - summary.succeeded,
                    summary.attempted
                )))
            }
        }
        PsAction::Count => {
            println!("{}", ctx.registry.count());
            Ok(())
        }
        PsAction::Clear { yes } => {
            if update::confirm("Forget every tracked process?", yes)? {
                let removed = ctx.registry.clear();
                ctx.reporter.success(format!("Removed {} records", removed));
            }
            Ok(())
        }
    }
}

fn dispatch_update(ctx: &mut AppContext, action: UpdateAction) -> AienvResult<()> {
    match action {
        UpdateAction::Scan => {
            update::print_packages(ctx);
            Ok(())
        }
        UpdateAction::Info => {
            update::show_info(ctx);
            Ok(())
        }
        UpdateAction::Install { index, yes } => {
            let packages = updates::scan(&ctx.paths.drop_dir);
            let package = updates::select(&packages, index).ok_or_else(|| {
                AienvError::validation(format!(
                    "no update archive at position {} ({} available)",
                    index,
                    packages.len()
                ))
            })?;
            if update::install(ctx, package, yes)? {
                Ok(())
            } else {
                Err(AienvError::validation("update was not installed"))
            }
        }
    }
}
