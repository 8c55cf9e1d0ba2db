//! Drop-folder update screens shared by the menu and `aienv update`.

use dialoguer::Confirm;

use crate::app::AppContext;
use crate::error::AienvResult;
use crate::menu::answered;
use crate::style::Tone;
use crate::update::{self, UpdateOutcome, UpdatePackage};

pub fn package_label(package: &UpdatePackage) -> String {
    match &package.version {
        Some(version) => format!("{} (v{}) - {}", package.name, version, package.size_display()),
        None => format!("{} - {}", package.name, package.size_display()),
    }
}

/// Scan the drop folder and print what is there, numbered from 1.
pub fn print_packages(ctx: &AppContext) -> Vec<UpdatePackage> {
    let packages = update::scan(&ctx.paths.drop_dir);
    if packages.is_empty() {
        ctx.reporter.warning("No update archives found in the new_versions folder.");
        println!("To add updates:");
        println!("  1. Copy update archives to: {}", ctx.paths.drop_dir.display());
        println!("  2. Return to this menu to install them");
        return packages;
    }

    ctx.reporter.heading("Available Updates:");
    for (index, package) in packages.iter().enumerate() {
        println!("{:2}. {}", index + 1, package_label(package));
    }
    packages
}

pub fn show_info(ctx: &AppContext) {
    let reporter = &ctx.reporter;
    let tick = reporter.paint(Tone::Success, "+");
    let drop_dir = ctx.paths.drop_dir.display().to_string();
    let launcher = ctx.platform.launcher_script_name();

    reporter.heading("AI Environment Update System");
    println!("How to use:");
    println!("  1. Copy new AI Environment archives (.zip or .tar.gz) to:");
    println!("     {}", reporter.paint(Tone::Info, &drop_dir));
    println!("  2. Select the Update option");
    println!("  3. Choose which archive to install");
    println!("  4. Confirm installation");
    println!();
    println!("Safety features:");
    println!("  {} Automatic backup before update", tick);
    println!("  {} Rollback on failure", tick);
    println!("  {} Version detection from file names", tick);
    println!("  {} Confirmation before installation", tick);
    println!("  {} Safe update for {} (applied after exit)", tick, launcher);
    println!();

    let packages = update::scan(&ctx.paths.drop_dir);
    if packages.is_empty() {
        reporter.warning("No update files found in the new_versions folder");
    } else {
        println!("Currently available updates: {}", packages.len());
        for package in &packages {
            println!("  - {}", package_label(package));
        }
    }
}

pub fn confirm(prompt: &str, assume_yes: bool) -> AienvResult<bool> {
    if assume_yes {
        return Ok(true);
    }
    let answer = answered(Confirm::new().with_prompt(prompt).default(false).interact())?;
    Ok(answer.unwrap_or(false))
}

/// Confirm and run the full update for `package`, reporting the outcome.
pub fn install(ctx: &AppContext, package: &UpdatePackage, assume_yes: bool) -> AienvResult<bool> {
    let reporter = &ctx.reporter;
    println!();
    println!("Selected: {}", package_label(package));
    reporter.warning("This will replace the current installation files. A backup is taken first.");
    if !confirm("Proceed with the update?", assume_yes)? {
        reporter.info("Update cancelled.");
        return Ok(false);
    }

    let installer = ctx.installer();
    match installer.install_update(package) {
        UpdateOutcome::Installed {
            report,
            swap_script,
            version_recorded,
        } => {
            for folder in &report.replaced_dirs {
                reporter.success(format!("Updated folder: {}", folder));
            }
            for file in &report.replaced_files {
                reporter.success(format!("Updated file: {}", file));
            }
            if !version_recorded {
                reporter.warning("Version metadata could not be updated");
            }
            if swap_script.is_some() {
                reporter.warning(format!(
                    "{} will be replaced once this program exits. Restart it afterwards.",
                    installer.layout().launcher
                ));
            }
            reporter.success("Update installed successfully");
            Ok(true)
        }
        UpdateOutcome::BackupFailed(err) => {
            reporter.error(format!("Backup failed, nothing was changed: {}", err.user_message()));
            Ok(false)
        }
        UpdateOutcome::InstallFailed {
            error,
            restore_error,
        } => {
            reporter.error(format!("Update failed: {}", error.user_message()));
            match restore_error {
                None => reporter.info("Previous installation restored from backup"),
                Some(restore_error) => reporter.error(format!(
                    "Restore failed ({}). Recover manually from {}",
                    restore_error.user_message(),
                    installer.backup_root().display()
                )),
            }
            Ok(false)
        }
    }
}
