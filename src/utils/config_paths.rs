//! 路径管理
//!
//! 设计原则:
//! - 安装根目录下的一切（进程注册表、更新投放目录、备份目录、版本元数据）都由此处派生
//! - 运行时数据（日志）保存在系统临时目录 `<tmp>/.aienv/`

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{
    BACKUP_DIR_NAME, DROP_DIR_NAME, LOG_FILE_NAME, MODELS_DIR_NAME, PROJECTS_DIR_NAME,
    REGISTRY_FILE_NAME, ROOT_ENV, RUNTIME_DIR_NAME, SETTINGS_FILE_NAME, VERSION_FILE_NAME,
};

/// Every fixed location under the installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPaths {
    /// 安装根目录
    pub root: PathBuf,
    /// 后台进程注册表 (JSON)
    pub registry_file: PathBuf,
    /// 更新包投放目录
    pub drop_dir: PathBuf,
    /// 更新前备份目录
    pub backup_dir: PathBuf,
    pub version_file: PathBuf,
    pub settings_file: PathBuf,
    pub projects_dir: PathBuf,
    pub models_dir: PathBuf,
    /// 运行时数据目录（/tmp/.aienv/）
    pub runtime_dir: PathBuf,
    pub log_file: PathBuf,
}

impl EnvPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let runtime_dir = std::env::temp_dir().join(RUNTIME_DIR_NAME);

        Self {
            registry_file: root.join(REGISTRY_FILE_NAME),
            drop_dir: root.join(DROP_DIR_NAME),
            backup_dir: root.join(BACKUP_DIR_NAME),
            version_file: root.join(VERSION_FILE_NAME),
            settings_file: root.join("config").join(SETTINGS_FILE_NAME),
            projects_dir: root.join(PROJECTS_DIR_NAME),
            models_dir: root.join(MODELS_DIR_NAME),
            log_file: runtime_dir.join(LOG_FILE_NAME),
            runtime_dir,
            root,
        }
    }

    /// Root from the command line, else `AIENV_ROOT`, else the current directory.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(ROOT_ENV) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => std::env::current_dir()?,
            },
        };
        Ok(Self::new(root))
    }

    /// 确保工作目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.drop_dir)?;
        std::fs::create_dir_all(&self.runtime_dir)?;
        Ok(())
    }
}
