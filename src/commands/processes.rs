//! Background process screens shared by the menu and `aienv ps`.

use crate::app::AppContext;
use crate::process::{ProcessView, StopOutcome, StopSummary};
use crate::style::{Reporter, Tone};

pub fn print_list(ctx: &mut AppContext) -> usize {
    let views = ctx.registry.list();
    if views.is_empty() {
        ctx.reporter.info("No background processes currently running");
        return 0;
    }

    ctx.reporter.heading("Background Processes:");
    for view in &views {
        print_view(&ctx.reporter, view);
    }
    views.len()
}

pub fn print_view(reporter: &Reporter, view: &ProcessView) {
    let record = &view.record;
    println!();
    println!("{}", reporter.paint(Tone::Accent, &format!("ID: {}", view.id)));
    println!("  Name: {}", record.name);
    println!("  PID: {}", record.pid);
    println!("  Status: {}", view.stats.status_display());
    println!("  CPU: {}", view.stats.cpu_display());
    println!("  Memory: {}", view.stats.memory_display());
    println!("  Started: {}", record.started_at);
    println!("  Command: {}", record.command);
    if let Some(url) = &record.url {
        println!("  URL: {}", reporter.paint(Tone::Info, url));
    }
}

/// Stop one id and report the outcome. Returns whether it ended cleanly.
pub fn stop(ctx: &mut AppContext, id: &str) -> bool {
    let name = match ctx.registry.get(id) {
        Some(record) => {
            ctx.reporter
                .info(format!("Stopping {} (PID: {})...", record.name, record.pid));
            record.name.clone()
        }
        None => {
            ctx.reporter.error(format!("Process ID '{}' not found", id));
            return false;
        }
    };

    let outcome = ctx.registry.stop(id);
    report_outcome(&ctx.reporter, &name, &outcome);
    outcome.is_success()
}

pub fn report_outcome(reporter: &Reporter, name: &str, outcome: &StopOutcome) {
    match outcome {
        StopOutcome::NotFound => reporter.error(format!("{} is not tracked", name)),
        StopOutcome::AlreadyExited => {
            reporter.warning(format!("Process {} was already dead", name))
        }
        StopOutcome::Graceful => reporter.success(format!("{} stopped gracefully", name)),
        StopOutcome::Forced => reporter.success(format!("{} force killed", name)),
        StopOutcome::Unconfirmed => reporter.warning(format!(
            "{} was signalled but did not confirm exit; no longer tracked",
            name
        )),
        StopOutcome::Failed(err) => {
            reporter.error(format!("Failed to stop {}: {}", name, err))
        }
    }
}

pub fn stop_all(ctx: &mut AppContext) -> StopSummary {
    if ctx.registry.count() == 0 {
        ctx.reporter.info("No background processes to stop");
        return StopSummary::default();
    }

    ctx.reporter.info("Stopping all background processes...");
    let summary = ctx.registry.stop_all();
    for (id, outcome) in &summary.outcomes {
        if !outcome.is_success() {
            report_outcome(&ctx.reporter, id, outcome);
        }
    }
    ctx.reporter.success(format!(
        "Stopped {}/{} processes",
        summary.succeeded, summary.attempted
    ));
    summary
}

/// Menu label for the process screen, carrying the live count.
pub fn menu_label(count: usize) -> String {
    if count == 0 {
        "Background Processes".to_string()
    } else {
        format!("Background Processes ({} running)", count)
    }
}
