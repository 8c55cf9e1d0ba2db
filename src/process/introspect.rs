//! Process introspection capability.
//!
//! Liveness and signalling always go through the platform primitives. Live
//! statistics (CPU, memory, OS status) come from `sysinfo` when the platform
//! supports it; [`NullIntrospector`] reports them as unavailable instead.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

use crate::config::{IntrospectionMode, EXIT_POLL_INTERVAL};
use crate::error::ProcessError;
use crate::platform;

const UNAVAILABLE: &str = "unavailable";

/// Point-in-time view of one process. `None` means the value could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessStats {
    pub cpu_percent: Option<f32>,
    pub memory_bytes: Option<u64>,
    pub status: Option<String>,
}

impl ProcessStats {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn cpu_display(&self) -> String {
        self.cpu_percent
            .map(|cpu| format!("{:.1}%", cpu))
            .unwrap_or_else(|| UNAVAILABLE.to_string())
    }

    pub fn memory_display(&self) -> String {
        self.memory_bytes
            .map(|bytes| format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| UNAVAILABLE.to_string())
    }

    pub fn status_display(&self) -> String {
        self.status.clone().unwrap_or_else(|| UNAVAILABLE.to_string())
    }
}

pub trait ProcessIntrospector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Snapshots for every pid that could be read. Missing keys mean unavailable.
    fn stats_many(&self, pids: &[u32]) -> HashMap<u32, ProcessStats>;

    fn stats(&self, pid: u32) -> ProcessStats {
        self.stats_many(&[pid]).remove(&pid).unwrap_or_default()
    }

    fn is_alive(&self, pid: u32) -> bool {
        platform::process_alive(pid)
    }

    fn terminate(&self, pid: u32) -> Result<(), ProcessError> {
        platform::send_terminate(pid)
    }

    fn kill(&self, pid: u32) -> Result<(), ProcessError> {
        platform::send_kill(pid)
    }
}

/// `sysinfo`-backed introspection. The `System` is kept between calls so
/// repeated listings do not rebuild the process table from scratch.
pub struct SystemIntrospector {
    system: Mutex<System>,
}

impl SystemIntrospector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessIntrospector for SystemIntrospector {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn stats_many(&self, pids: &[u32]) -> HashMap<u32, ProcessStats> {
        if pids.is_empty() {
            return HashMap::new();
        }
        let targets: Vec<Pid> = pids.iter().copied().map(Pid::from_u32).collect();
        let kind = ProcessRefreshKind::new().with_cpu().with_memory();

        let mut system = self.system.lock();
        // CPU usage is a delta between two refreshes.
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&targets), true, kind);
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&targets), true, kind);

        targets
            .iter()
            .filter_map(|pid| {
                let process = system.process(*pid)?;
                if process.status() == ProcessStatus::Zombie {
                    return None;
                }
                Some((
                    pid.as_u32(),
                    ProcessStats {
                        cpu_percent: Some(process.cpu_usage()),
                        memory_bytes: Some(process.memory()),
                        status: Some(process.status().to_string().to_lowercase()),
                    },
                ))
            })
            .collect()
    }
}

/// Liveness and signals only.
pub struct NullIntrospector;

impl ProcessIntrospector for NullIntrospector {
    fn name(&self) -> &'static str {
        "none"
    }

    fn stats_many(&self, _pids: &[u32]) -> HashMap<u32, ProcessStats> {
        HashMap::new()
    }
}

/// Select the implementation once at startup.
pub fn detect(mode: IntrospectionMode) -> Arc<dyn ProcessIntrospector> {
    let introspector: Arc<dyn ProcessIntrospector> =
        if mode == IntrospectionMode::Auto && sysinfo::IS_SUPPORTED_SYSTEM {
            Arc::new(SystemIntrospector::new())
        } else {
            Arc::new(NullIntrospector)
        };
    debug!(introspector = introspector.name(), "process introspection selected");
    introspector
}

/// Poll until `pid` is gone or `timeout` elapses. Returns whether it exited.
pub fn wait_for_exit(introspector: &dyn ProcessIntrospector, pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !introspector.is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}
