//! CLI 命令行参数解析
//!
//! 没有子命令时进入交互式菜单；其余子命令提供非交互入口。

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::launcher::AppKind;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "aienv",
    about = "AI development environment manager with background process tracking and drop-folder updates",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Installation root (defaults to AIENV_ROOT, then the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Console log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 交互式主菜单（无参数时的默认行为）
    Menu,

    /// 后台进程管理
    #[command(subcommand)]
    Ps(PsAction),

    /// 在后台启动应用并登记
    Launch {
        /// Application to start
        #[arg(value_enum)]
        app: AppKind,
        /// Open the URL in a browser once the service answers
        #[arg(long)]
        open: bool,
    },

    /// 在后台运行任意命令并登记
    Run {
        /// Display name for the process list
        #[arg(long)]
        name: String,
        /// Program and arguments, passed through unchanged (use `sh -c` for shell syntax)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// 更新投放目录管理
    #[command(subcommand)]
    Update(UpdateAction),

    /// 显示版本与构建信息
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PsAction {
    /// List tracked processes with live statistics
    List,
    /// Stop one tracked process
    Stop {
        /// Process id as shown by `ps list`
        id: String,
    },
    /// Stop every tracked process
    StopAll,
    /// Print the number of live tracked processes
    Count,
    /// Forget every record without signalling anything
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum UpdateAction {
    /// List archives in the drop folder
    Scan,
    /// Explain the update system and show what is available
    Info,
    /// Install an archive from the drop folder
    Install {
        /// 1-based position from `update scan`
        #[arg(long, default_value_t = 1)]
        index: usize,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
