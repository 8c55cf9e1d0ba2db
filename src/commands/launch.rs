//! Launch screens shared by the menu and `aienv launch`.

use crate::app::AppContext;
use crate::error::{AienvError, AienvResult};
use crate::launcher::{self, AppKind, LaunchReport, Readiness};
use crate::style::Reporter;

pub fn run(ctx: &mut AppContext, app: AppKind, open: bool) -> AienvResult<LaunchReport> {
    ctx.reporter.info(format!("Launching {} in background...", app.label()));
    let report = {
        let (launcher, registry) = ctx.launcher();
        launcher.launch(registry, app)?
    };
    report_launch(&ctx.reporter, &report);

    if open && report.readiness == Readiness::Ready {
        if let Some(url) = &report.url {
            if let Err(err) = launcher::open_browser(url) {
                ctx.reporter.warning(format!("Could not open browser: {}", err));
            }
        }
    }
    Ok(report)
}

pub fn run_custom(ctx: &mut AppContext, name: &str, command_line: &str) -> AienvResult<LaunchReport> {
    if command_line.trim().is_empty() {
        return Err(AienvError::validation("command must not be empty"));
    }
    ctx.reporter.info(format!("Launching {} in background...", name));
    let report = {
        let (launcher, registry) = ctx.launcher();
        launcher.launch_custom(registry, name, command_line)?
    };
    report_launch(&ctx.reporter, &report);
    Ok(report)
}

fn report_launch(reporter: &Reporter, report: &LaunchReport) {
    reporter.success(format!(
        "{} launched successfully (PID: {})",
        report.name, report.pid
    ));
    match report.readiness {
        Readiness::Ready | Readiness::NotApplicable => {}
        Readiness::TimedOut => reporter.warning(format!(
            "{} is not answering yet; it may still be starting",
            report.name
        )),
        Readiness::Interrupted => reporter.info("Stopped waiting; the process keeps running"),
    }
    if let Some(url) = &report.url {
        reporter.info(format!("Access {} at: {}", report.name, url));
    }
}

pub fn open_terminal(ctx: &AppContext) -> AienvResult<()> {
    ctx.platform
        .open_terminal(&ctx.paths.root, &ctx.activation)
        .map_err(|err| AienvError::filesystem("could not open a terminal", &ctx.paths.root, err))?;
    match &ctx.activation.env_name {
        Some(env) => ctx
            .reporter
            .success(format!("Terminal opened with environment {} active", env)),
        None => ctx.reporter.success("Terminal opened"),
    }
    Ok(())
}

pub fn open_file_manager(ctx: &AppContext) -> AienvResult<()> {
    ctx.platform
        .open_file_manager(&ctx.paths.root)
        .map_err(|err| AienvError::filesystem("could not open the file manager", &ctx.paths.root, err))?;
    ctx.reporter
        .success(format!("Opened {}", ctx.paths.root.display()));
    Ok(())
}
