//! 版本信息管理

use std::process::Command;

/// 构建信息
#[derive(Debug)]
pub struct BuildInfo {
    pub version: String,
    pub commit_hash: String,
    pub target_os: &'static str,
}

impl BuildInfo {
    pub fn get() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit_hash: get_git_hash(),
            target_os: std::env::consts::OS,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("aienv {}", self.version),
            format!("Commit: {}", self.commit_hash),
            format!("Platform: {}", self.target_os),
        ]
    }
}

/// 获取 Git 提交哈希
fn get_git_hash() -> String {
    option_env!("AIENV_GIT_HASH")
        .map(str::to_string)
        .or_else(|| {
            Command::new("git")
                .args(["rev-parse", "--short", "HEAD"])
                .output()
                .ok()
                .filter(|output| output.status.success())
                .and_then(|output| String::from_utf8(output.stdout).ok())
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
