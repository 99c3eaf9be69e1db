//! SIGINT plumbing. The OS-level handler only flips an atomic flag; the
//! watcher thread owned by the controller does the actual work.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static PENDING: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    PENDING.store(true, Ordering::SeqCst);
}

/// Route SIGINT to the pending flag.
#[cfg(unix)]
pub fn install() -> io::Result<()> {
    PENDING.store(false, Ordering::SeqCst);
    let handler = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler performs a single atomic store, which is async-signal-safe.
    let previous = unsafe { libc::signal(libc::SIGINT, handler) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Give SIGINT back its default disposition.
#[cfg(unix)]
pub fn restore() {
    // SAFETY: resetting a signal to SIG_DFL has no preconditions.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
pub fn install() -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub fn restore() {}

/// Consume a pending interrupt, if one arrived since the last call.
pub fn take_pending() -> bool {
    PENDING.swap(false, Ordering::SeqCst)
}
