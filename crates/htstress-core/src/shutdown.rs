//! Cooperative shutdown flags
//!
//! Two independent requests can end a run:
//!
//! - **abort**: stop every worker at its next poll point; no report.
//! - **finish**: lower the completion ceiling to the current count so the
//!   run ends through the normal ceiling path and reports.
//!
//! A signal handler only stores a flag (`ShutdownFlags::request_*`), which is
//! a single atomic word write. Workers poll `ShutdownSignal` at the top of
//! each loop iteration and do all of the reacting themselves.
//!
//! Signals can be linked: a child observes its parent's requests as well as
//! its own, so the engine can halt its workers without touching the
//! process-wide flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The raw flag pair. `const`-constructible so it can live in a static that a
/// signal handler writes to.
#[derive(Debug)]
pub struct ShutdownFlags {
    abort: AtomicBool,
    finish: AtomicBool,
}

impl ShutdownFlags {
    pub const fn new() -> Self {
        Self {
            abort: AtomicBool::new(false),
            finish: AtomicBool::new(false),
        }
    }

    /// Async-signal-safe: one atomic store
    #[inline]
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Async-signal-safe: one atomic store
    #[inline]
    pub fn request_finish(&self) {
        self.finish.store(true, Ordering::Release);
    }

    #[inline]
    fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    #[inline]
    fn finish_requested(&self) -> bool {
        self.finish.load(Ordering::Acquire)
    }
}

impl Default for ShutdownFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle observed by workers
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: SignalInner,
}

#[derive(Clone)]
enum SignalInner {
    /// Heap-allocated flags, optionally linked to a parent
    Owned(Arc<OwnedSignal>),
    /// Process-wide flags written by signal handlers
    Static(&'static ShutdownFlags),
}

struct OwnedSignal {
    flags: ShutdownFlags,
    parent: Option<ShutdownSignal>,
}

impl ShutdownSignal {
    /// Independent signal, not tied to any OS signal
    pub fn new() -> Self {
        Self {
            inner: SignalInner::Owned(Arc::new(OwnedSignal {
                flags: ShutdownFlags::new(),
                parent: None,
            })),
        }
    }

    /// Signal backed by static flags (the ones the handlers write)
    pub const fn from_static(flags: &'static ShutdownFlags) -> Self {
        Self {
            inner: SignalInner::Static(flags),
        }
    }

    /// Child signal: sees this signal's requests, but its own requests do
    /// not propagate upward
    pub fn child(&self) -> Self {
        Self {
            inner: SignalInner::Owned(Arc::new(OwnedSignal {
                flags: ShutdownFlags::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    #[inline]
    fn flags(&self) -> &ShutdownFlags {
        match &self.inner {
            SignalInner::Owned(arc) => &arc.flags,
            SignalInner::Static(flags) => flags,
        }
    }

    #[inline]
    fn parent(&self) -> Option<&ShutdownSignal> {
        match &self.inner {
            SignalInner::Owned(arc) => arc.parent.as_ref(),
            SignalInner::Static(_) => None,
        }
    }

    #[inline]
    pub fn abort_requested(&self) -> bool {
        self.flags().abort_requested() || self.parent().is_some_and(|p| p.abort_requested())
    }

    #[inline]
    pub fn finish_requested(&self) -> bool {
        self.flags().finish_requested() || self.parent().is_some_and(|p| p.finish_requested())
    }

    pub fn request_abort(&self) {
        self.flags().request_abort();
    }

    pub fn request_finish(&self) {
        self.flags().request_finish();
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("abort", &self.abort_requested())
            .field("finish", &self.finish_requested())
            .finish()
    }
}
