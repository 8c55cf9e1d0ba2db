//! 工具模块

pub mod config_paths;
pub mod env;
pub mod logger;
pub mod version;
