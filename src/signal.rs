//! Graceful-shutdown signal handling.
//!
//! A single `AtomicBool`, set from a `SIGINT` handler and polled by the
//! event loop between batches — the only state shared with a signal
//! handler. There is exactly one thread, so no synchronization beyond the
//! atomic itself is needed.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Installs the `SIGINT` handler. Call once, before entering the event
/// loop.
pub(crate) fn install() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_sigint as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
    }
}

pub(crate) fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
