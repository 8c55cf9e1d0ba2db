//! 日志系统
//!
//! Console output goes to stderr so it never interleaves with the menu on
//! stdout; the file layer keeps full debug detail for post-mortems.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志系统
///
/// # Arguments
/// * `log_level` - console level (trace, debug, info, warn, error); `None` reads `RUST_LOG`, then defaults to `warn`
/// * `log_file` - append-only log file, always written at `debug`
///
/// # Examples
/// ```no_run
/// use aienv::utils::logger::init_logger;
///
/// init_logger(Some("info"), None).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let console_filter = if let Some(level) = log_level {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(console::colors_enabled_stderr())
        .compact()
        .with_filter(console_filter);

    let file_layer = match log_file {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;

            Some(
                fmt::layer()
                    .with_writer(std::sync::Arc::new(file))
                    .with_target(true)
                    .with_ansi(false)
                    .with_level(true)
                    .with_filter(EnvFilter::new("info,aienv=debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logger initialized");
    Ok(())
}
