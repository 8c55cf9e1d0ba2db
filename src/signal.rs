//! Operator interrupt handling.
//!
//! Ctrl-C must not kill the menu: it aborts whatever blocking action is in
//! progress (readiness polling, long waits) and control returns to the loop.
//! The handler only flips an atomic flag; long-running loops poll it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the process-wide handler. Safe to call more than once.
pub fn install() -> io::Result<()> {
    #[cfg(unix)]
    {
        setup_unix_signal_handler()?;
    }

    #[cfg(windows)]
    {
        setup_windows_signal_handler()?;
    }

    Ok(())
}

/// Whether an interrupt arrived since the last [`take_interrupt`].
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Record an interrupt that arrived as a key press rather than a signal
/// (terminal prompts read Ctrl-C in raw mode).
pub fn note_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Consume a pending interrupt.
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

#[cfg(unix)]
fn setup_unix_signal_handler() -> io::Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use std::sync::Once;

    static INIT: Once = Once::new();
    let mut result = Ok(());

    extern "C" fn handler(_signum: nix::libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    INIT.call_once(|| {
        // SA_RESTART keeps blocking reads (menu prompts) from failing with EINTR.
        let action = SigAction::new(
            SigHandler::Handler(handler),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only touches an atomic, which is async-signal-safe.
        if let Err(errno) = unsafe { sigaction(Signal::SIGINT, &action) } {
            result = Err(io::Error::from(errno));
        }
    });

    result
}

#[cfg(windows)]
fn setup_windows_signal_handler() -> io::Result<()> {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::{SetConsoleCtrlHandler, CTRL_BREAK_EVENT, CTRL_C_EVENT};

    unsafe extern "system" fn handler(ctrl_type: u32) -> BOOL {
        match ctrl_type {
            CTRL_C_EVENT | CTRL_BREAK_EVENT => {
                INTERRUPTED.store(true, Ordering::SeqCst);
                BOOL(1)
            }
            _ => BOOL(0),
        }
    }

    unsafe { SetConsoleCtrlHandler(Some(handler), true) }
        .map_err(|err| io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn take_clears_flag() {
        INTERRUPTED.store(true, Ordering::SeqCst);
        assert!(interrupted());
        assert!(take_interrupt());
        assert!(!interrupted());
        assert!(!take_interrupt());
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn sigint_sets_flag_instead_of_exiting() {
        install().unwrap();
        take_interrupt();
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGINT).unwrap();
        assert!(take_interrupt());
    }
}
