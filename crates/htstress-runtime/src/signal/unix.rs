//! Unix handlers for SIGINT / SIGTERM

use htstress_core::error::{HtsError, HtsResult};
use htstress_core::{ShutdownFlags, ShutdownSignal};

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

static PROCESS_SHUTDOWN: ShutdownFlags = ShutdownFlags::new();
static HANDLERS_INSTALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: libc::c_int) {
    PROCESS_SHUTDOWN.request_finish();
}

extern "C" fn on_sigterm(_: libc::c_int) {
    PROCESS_SHUTDOWN.request_abort();
}

#[inline]
fn setup_err(e: Errno) -> HtsError {
    HtsError::SignalSetup(e as i32)
}

/// Install the SIGINT/SIGTERM handlers and return the signal they drive.
///
/// No `SA_RESTART`: a blocked `epoll_wait` on the receiving thread must come
/// back with `EINTR` so the worker re-checks the flags. Calling this again
/// only returns another handle to the same flags.
pub fn install_handlers() -> HtsResult<ShutdownSignal> {
    if !HANDLERS_INSTALLED.swap(true, Ordering::SeqCst) {
        let mask = SigSet::empty();
        let finish = SigAction::new(SigHandler::Handler(on_sigint), SaFlags::empty(), mask);
        let abort = SigAction::new(SigHandler::Handler(on_sigterm), SaFlags::empty(), mask);
        // SAFETY: both handlers only perform a single atomic store
        unsafe {
            sigaction(Signal::SIGINT, &finish).map_err(setup_err)?;
            sigaction(Signal::SIGTERM, &abort).map_err(setup_err)?;
        }
    }
    Ok(process_shutdown())
}

/// Handle on the flags the handlers write
pub fn process_shutdown() -> ShutdownSignal {
    ShutdownSignal::from_static(&PROCESS_SHUTDOWN)
}

/// Restores the calling thread's signal mask on drop
pub struct SignalMaskGuard {
    previous: SigSet,
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        let _ = self.previous.thread_set_mask();
    }
}

/// Block SIGINT and SIGTERM on the calling thread.
///
/// The coordinating thread does this once the workers are running, so the
/// kernel delivers termination signals to a worker whose wait they interrupt.
pub fn block_termination_signals() -> HtsResult<SignalMaskGuard> {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    let previous = set.thread_swap_mask(SigmaskHow::SIG_BLOCK).map_err(setup_err)?;
    Ok(SignalMaskGuard { previous })
}
