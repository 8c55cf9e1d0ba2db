//! Environment variable utilities with platform-specific behavior.

use std::path::PathBuf;

/// Expand environment variable placeholder (${VAR_NAME})
///
/// # Platform Behavior
/// - **Windows**: Case-insensitive (e.g., `%USERNAME%` == `%username%`)
/// - **Linux/macOS**: Case-sensitive (e.g., `$USER` != `$user`)
pub fn expand_env_var(value: &str) -> String {
    if !value.starts_with("${") || !value.ends_with('}') {
        return value.to_string();
    }

    let var_name = &value[2..value.len() - 1];

    #[cfg(windows)]
    {
        std::env::vars()
            .find(|(k, _)| k.eq_ignore_ascii_case(var_name))
            .map(|(_, v)| v)
            .unwrap_or_else(|| value.to_string())
    }

    #[cfg(not(windows))]
    {
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    }
}

/// Turn a settings value into a path: `${VAR}` is expanded first, then a
/// leading `~/` is resolved against the home directory.
pub fn expand_path(value: &str) -> PathBuf {
    let expanded = expand_env_var(value);
    if let Some(rest) = expanded.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(expanded)
}
