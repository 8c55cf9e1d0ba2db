//! JSON-backed registry of background processes started by this tool.
//!
//! The file is a flat `{ id: record }` object rewritten wholesale on every
//! mutation. There is no locking: two concurrent sessions race and the last
//! writer wins.

use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{FORCE_STOP_TIMEOUT, GRACEFUL_STOP_TIMEOUT};
use crate::error::{ProcessError, RegistryError};
use crate::process::introspect::{wait_for_exit, ProcessIntrospector};
use crate::process::record::{ProcessRecord, ProcessView};

/// Bounded waits of the two-stage stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTimeouts {
    pub graceful: Duration,
    pub forced: Duration,
}

impl Default for StopTimeouts {
    fn default() -> Self {
        Self {
            graceful: GRACEFUL_STOP_TIMEOUT,
            forced: FORCE_STOP_TIMEOUT,
        }
    }
}

/// Result of [`ProcessRegistry::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No record under that id.
    NotFound,
    /// The process was already gone; the stale record was dropped.
    AlreadyExited,
    /// Exited after the terminate request.
    Graceful,
    /// Exited after being killed.
    Forced,
    /// Signals were delivered but exit was not observed in time. Untracked anyway.
    Unconfirmed,
    /// Could not signal the process at all. The record is kept.
    Failed(ProcessError),
}

impl StopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StopOutcome::AlreadyExited | StopOutcome::Graceful | StopOutcome::Forced
        )
    }

    /// Whether the record is gone after this outcome.
    pub fn untracked(&self) -> bool {
        !matches!(self, StopOutcome::NotFound | StopOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub outcomes: Vec<(String, StopOutcome)>,
}

pub struct ProcessRegistry {
    path: PathBuf,
    records: BTreeMap<String, ProcessRecord>,
    introspector: Arc<dyn ProcessIntrospector>,
    timeouts: StopTimeouts,
}

impl ProcessRegistry {
    /// Open the registry at `path` and load it immediately.
    pub fn open(path: impl Into<PathBuf>, introspector: Arc<dyn ProcessIntrospector>) -> Self {
        let mut registry = Self {
            path: path.into(),
            records: BTreeMap::new(),
            introspector,
            timeouts: StopTimeouts::default(),
        };
        registry.load();
        registry
    }

    pub fn with_stop_timeouts(mut self, timeouts: StopTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn introspector(&self) -> &dyn ProcessIntrospector {
        self.introspector.as_ref()
    }

    /// Replace in-memory state with the file contents, then reconcile.
    ///
    /// Never fails: a missing file is an empty registry, an unreadable one is
    /// logged, kept aside as `<file>.corrupt` and treated as empty, and
    /// individual malformed entries are dropped.
    pub fn load(&mut self) {
        let (records, dropped) = self.read_file();
        self.records = records;

        let removed = self.reconcile();
        if dropped > 0 && removed == 0 {
            self.save();
        }
    }

    /// Pretty-print the map to disk. Failures are logged, never returned.
    pub fn save(&self) {
        match self.write_file() {
            Ok(()) => debug!(path = %self.path.display(), records = self.records.len(), "registry saved"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "could not save process tracking file"
            ),
        }
    }

    /// Drop records whose PID is no longer alive. Persists only when
    /// something was removed; returns how many were.
    pub fn reconcile(&mut self) -> usize {
        let introspector = Arc::clone(&self.introspector);
        let before = self.records.len();
        self.records.retain(|id, record| {
            let alive = introspector.is_alive(record.pid);
            if !alive {
                debug!(id = %id, pid = record.pid, "pruning dead process");
            }
            alive
        });

        let removed = before - self.records.len();
        if removed > 0 {
            info!(removed, "reconciled process registry");
            self.save();
        }
        removed
    }

    /// Track a freshly spawned process. Refuses PIDs that are already gone.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        pid: u32,
        command: impl Into<String>,
        url: Option<String>,
    ) -> Result<(), RegistryError> {
        self.register_record(id, ProcessRecord::new(name, pid, command, url))
    }

    pub fn register_record(
        &mut self,
        id: impl Into<String>,
        record: ProcessRecord,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        if !self.introspector.is_alive(record.pid) {
            warn!(id = %id, pid = record.pid, "process exited before it could be tracked");
            return Err(RegistryError::ProcessNotRunning {
                id,
                pid: record.pid,
            });
        }

        info!(id = %id, name = %record.name, pid = record.pid, "tracking process");
        if self.records.insert(id.clone(), record).is_some() {
            debug!(id = %id, "replaced existing record");
        }
        self.save();
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<ProcessRecord> {
        let removed = self.records.remove(id)?;
        info!(id, name = %removed.name, "stopped tracking");
        self.save();
        Some(removed)
    }

    /// Reconcile, then annotate every surviving record with live stats.
    pub fn list(&mut self) -> Vec<ProcessView> {
        self.reconcile();

        let pids: Vec<u32> = self.records.values().map(|record| record.pid).collect();
        let mut stats = self.introspector.stats_many(&pids);

        self.records
            .iter()
            .map(|(id, record)| ProcessView {
                id: id.clone(),
                record: record.clone(),
                stats: stats.remove(&record.pid).unwrap_or_default(),
            })
            .collect()
    }

    /// Terminate gracefully, escalate to kill, and untrack.
    pub fn stop(&mut self, id: &str) -> StopOutcome {
        let Some(record) = self.records.get(id) else {
            return StopOutcome::NotFound;
        };
        let pid = record.pid;
        let name = record.name.clone();

        let outcome = self.terminate(pid);
        match &outcome {
            StopOutcome::Failed(err) => {
                warn!(id, name = %name, pid, error = %err, "could not stop process; still tracked");
                return outcome;
            }
            StopOutcome::Unconfirmed => {
                warn!(id, name = %name, pid, "process did not confirm exit; untracking anyway");
            }
            _ => info!(id, name = %name, pid, outcome = ?outcome, "process stopped"),
        }

        self.records.remove(id);
        self.save();
        outcome
    }

    fn terminate(&self, pid: u32) -> StopOutcome {
        let introspector = self.introspector.as_ref();

        let signalled = match introspector.terminate(pid) {
            Ok(()) => {
                if wait_for_exit(introspector, pid, self.timeouts.graceful) {
                    return StopOutcome::Graceful;
                }
                true
            }
            Err(ProcessError::NoSuchProcess { .. }) => return StopOutcome::AlreadyExited,
            Err(err @ ProcessError::PermissionDenied { .. }) => return StopOutcome::Failed(err),
            Err(err) => {
                debug!(pid, error = %err, "terminate request failed; escalating");
                false
            }
        };

        match introspector.kill(pid) {
            Ok(()) if wait_for_exit(introspector, pid, self.timeouts.forced) => StopOutcome::Forced,
            Ok(()) => StopOutcome::Unconfirmed,
            Err(ProcessError::NoSuchProcess { .. }) if signalled => StopOutcome::Graceful,
            Err(ProcessError::NoSuchProcess { .. }) => StopOutcome::AlreadyExited,
            Err(_) if signalled => StopOutcome::Unconfirmed,
            Err(err) => StopOutcome::Failed(err),
        }
    }

    /// Stop every tracked id from a snapshot; one failure never aborts the rest.
    pub fn stop_all(&mut self) -> StopSummary {
        let ids: Vec<String> = self.records.keys().cloned().collect();
        let mut summary = StopSummary::default();

        for id in ids {
            let outcome = self.stop(&id);
            if outcome == StopOutcome::NotFound {
                continue;
            }
            summary.attempted += 1;
            if outcome.is_success() {
                summary.succeeded += 1;
            }
            summary.outcomes.push((id, outcome));
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            "stop all finished"
        );
        summary
    }

    /// Number of live tracked processes (reconciles first).
    pub fn count(&mut self) -> usize {
        self.reconcile();
        self.records.len()
    }

    /// Forget every record without signalling anything.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.save();
        removed
    }

    pub fn get(&self, id: &str) -> Option<&ProcessRecord> {
        self.records.get(id)
    }

    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.records
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn read_file(&self) -> (BTreeMap<String, ProcessRecord>, usize) {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return (BTreeMap::new(), 0),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not read process tracking file");
                return (BTreeMap::new(), 0);
            }
        };
        if content.trim().is_empty() {
            return (BTreeMap::new(), 0);
        }

        let raw: BTreeMap<String, Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "process tracking file is corrupt; starting empty"
                );
                self.preserve_corrupt();
                return (BTreeMap::new(), 0);
            }
        };

        let total = raw.len();
        let records: BTreeMap<String, ProcessRecord> = raw
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value(value) {
                Ok(record) => Some((id, record)),
                Err(err) => {
                    warn!(id = %id, error = %err, "dropping malformed process record");
                    None
                }
            })
            .collect();
        let dropped = total - records.len();
        (records, dropped)
    }

    fn write_file(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        fs::write(&self.path, json)
    }

    fn preserve_corrupt(&self) {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".corrupt");
        let target = self.path.with_file_name(name);
        match fs::copy(&self.path, &target) {
            Ok(_) => warn!(copy = %target.display(), "kept unreadable registry for inspection"),
            Err(err) => warn!(error = %err, "could not keep unreadable registry"),
        }
    }
}
