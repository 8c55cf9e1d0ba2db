#![cfg(unix)]
//! Registry behaviour against real OS processes.

use aienv::platform::{self, send_kill, PlatformOps};
use aienv::process::{
    ProcessIntrospector, ProcessRegistry, StopOutcome, StopTimeouts, SystemIntrospector,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn spawn_sleeper() -> u32 {
    platform::current()
        .spawn_detached(Command::new("sleep").arg("30"))
        .expect("sleep spawns")
}

fn open(dir: &TempDir) -> ProcessRegistry {
    ProcessRegistry::open(
        dir.path().join("background_processes.json"),
        Arc::new(SystemIntrospector::new()),
    )
    .with_stop_timeouts(StopTimeouts {
        graceful: Duration::from_secs(2),
        forced: Duration::from_secs(2),
    })
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
#[serial]
fn registered_service_is_listed_until_killed_externally() {
    let dir = TempDir::new().unwrap();
    let mut registry = open(&dir);
    let pid = spawn_sleeper();

    registry
        .register("svc1", "Service", pid, "sleep 30", Some("http://localhost:9000".into()))
        .unwrap();

    let views = registry.list();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].id, "svc1");
    assert_eq!(views[0].record.pid, pid);
    assert_eq!(views[0].record.url.as_deref(), Some("http://localhost:9000"));
    assert!(views[0].stats.memory_bytes.is_some());
    assert!(views[0].stats.cpu_percent.is_some());

    send_kill(pid).unwrap();
    assert!(wait_until(|| registry.count() == 0));
    assert!(registry.list().is_empty());

    let reopened = open(&dir);
    assert!(reopened.get("svc1").is_none());
}

#[test]
#[serial]
fn stop_terminates_and_untracks() {
    let dir = TempDir::new().unwrap();
    let mut registry = open(&dir);
    let pid = spawn_sleeper();
    registry.register("sleeper", "Sleeper", pid, "sleep 30", None).unwrap();

    assert_eq!(registry.stop("sleeper"), StopOutcome::Graceful);
    assert_eq!(registry.count(), 0);
    assert!(!registry.introspector().is_alive(pid));
    assert_eq!(registry.stop("sleeper"), StopOutcome::NotFound);
}

#[test]
#[serial]
fn duplicate_id_keeps_latest_registration() {
    let dir = TempDir::new().unwrap();
    let mut registry = open(&dir);
    let first = spawn_sleeper();
    let second = spawn_sleeper();

    registry.register("dup", "First", first, "sleep 30", None).unwrap();
    registry.register("dup", "Second", second, "sleep 30", None).unwrap();

    assert_eq!(registry.count(), 1);
    assert_eq!(registry.get("dup").map(|r| r.pid), Some(second));

    let summary = registry.stop_all();
    assert_eq!((summary.attempted, summary.succeeded), (1, 1));
    send_kill(first).unwrap();
}

#[test]
#[serial]
fn reconcile_is_idempotent_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut registry = open(&dir);
    let alive = spawn_sleeper();
    let doomed = spawn_sleeper();
    registry.register("alive", "Alive", alive, "sleep 30", None).unwrap();
    registry.register("doomed", "Doomed", doomed, "sleep 30", None).unwrap();

    send_kill(doomed).unwrap();
    assert!(wait_until(|| !registry.introspector().is_alive(doomed)));

    assert_eq!(registry.reconcile(), 1);
    let after_first = std::fs::read_to_string(registry.path()).unwrap();
    assert_eq!(registry.reconcile(), 0);
    let after_second = std::fs::read_to_string(registry.path()).unwrap();
    assert_eq!(after_first, after_second);

    registry.stop_all();
}
