//! Run-wide counters
//!
//! One `GlobalStats` is created per run and shared by `Arc` with every
//! worker. All updates are single atomic read-modify-write operations; there
//! is no lock anywhere on the hot path.
//!
//! # Ceiling and overshoot
//!
//! `try_issue` increments `issued` first and only then compares against the
//! ceiling. A completion that lands above the ceiling is compensated with a
//! single decrement and its outcome is discarded. Between the increment and
//! the decrement other workers can observe the inflated value, so the
//! terminal count may fall short of the ceiling by at most
//! `threads × concurrency`. It never exceeds it.
//!
//! `finish_now` raises `finishing` before it reads `issued` and publishes
//! the lowered ceiling through `frozen` afterwards. A claim that sees
//! `finishing` without `frozen` is discarded, and a claim that missed
//! `finishing` was already included in the `issued` the finisher read. Both
//! sides use `SeqCst` for these accesses, so the graceful path obeys the
//! same bound as a bounded run.
//!
//! ```text
//!   worker A                 issued      worker B
//!   fetch_add  -> 10           10
//!                              11        fetch_add -> 11 (> max 10)
//!   counted, last                        fetch_sub, discarded
//!                              10
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::status::Outcome;

/// Result of claiming a completion against the ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issue {
    /// The completion counts. `completed` is the running total including it;
    /// `last` is set when it reached the ceiling.
    Counted { completed: u64, last: bool },
    /// The ceiling was already full; the increment was rolled back.
    Discarded,
}

/// Lock-free counters shared by all workers
#[derive(Debug)]
pub struct GlobalStats {
    issued: AtomicU64,
    good: AtomicU64,
    bad: AtomicU64,
    socket_errors: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,

    /// 0 means unbounded unless `capped` is set
    max_requests: AtomicU64,
    capped: AtomicBool,
    finishing: AtomicBool,
    /// Set once a graceful finish has published its lowered ceiling
    frozen: AtomicBool,
}

impl GlobalStats {
    /// Create counters for a run; `max_requests == 0` means unbounded
    pub fn new(max_requests: u64) -> Self {
        Self {
            issued: AtomicU64::new(0),
            good: AtomicU64::new(0),
            bad: AtomicU64::new(0),
            socket_errors: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            max_requests: AtomicU64::new(max_requests),
            capped: AtomicBool::new(max_requests != 0),
            finishing: AtomicBool::new(false),
            frozen: AtomicBool::new(false),
        }
    }

    /// Current completion ceiling, `None` while unbounded
    #[inline]
    pub fn limit(&self) -> Option<u64> {
        // capped before max: a lowered ceiling is published max-then-capped
        if self.capped.load(Ordering::Acquire) {
            Some(self.max_requests.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Claim one finished request against the ceiling
    #[inline]
    pub fn try_issue(&self) -> Issue {
        let completed = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let ceiling = if self.finishing.load(Ordering::SeqCst) && !self.frozen.load(Ordering::Acquire) {
            // finish in progress, lowered ceiling not published yet
            Some(0)
        } else {
            self.limit()
        };
        match ceiling {
            Some(max) if completed > max => {
                self.issued.fetch_sub(1, Ordering::AcqRel);
                Issue::Discarded
            }
            Some(max) => Issue::Counted { completed, last: completed >= max },
            None => Issue::Counted { completed, last: false },
        }
    }

    /// Record the status class of a counted completion
    #[inline]
    pub fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Good => self.good.fetch_add(1, Ordering::Release),
            Outcome::Bad => self.bad.fetch_add(1, Ordering::Release),
        };
    }

    #[inline]
    pub fn record_socket_error(&self) {
        self.socket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Credit the transfer bytes of a counted cycle
    #[inline]
    pub fn record_sent(&self, n: usize) {
        self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_received(&self, n: usize) {
        self.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// True once the ceiling is (transiently or finally) full
    #[inline]
    pub fn ceiling_reached(&self) -> bool {
        match self.limit() {
            Some(max) => self.issued.load(Ordering::Acquire) >= max,
            None => false,
        }
    }

    /// Graceful finish: lower the ceiling to what has completed so far.
    ///
    /// Only the first call has an effect. Returns the ceiling in force.
    pub fn finish_now(&self) -> u64 {
        if self.finishing.swap(true, Ordering::SeqCst) {
            return self.max_requests.load(Ordering::Acquire);
        }
        let issued = self.issued.load(Ordering::SeqCst);
        let lowered = match self.limit() {
            Some(max) => issued.min(max),
            None => issued,
        };
        self.max_requests.store(lowered, Ordering::Release);
        self.capped.store(true, Ordering::Release);
        self.frozen.store(true, Ordering::Release);
        lowered
    }

    /// Point-in-time copy of the counters.
    ///
    /// `good`/`bad` are read before `issued`, so `good + bad <= issued` holds
    /// in every snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        let good = self.good.load(Ordering::Acquire);
        let bad = self.bad.load(Ordering::Acquire);
        StatsSnapshot {
            completed: self.issued.load(Ordering::Acquire),
            good,
            bad,
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the counters for reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub good: u64,
    pub bad: u64,
    pub socket_errors: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl StatsSnapshot {
    /// Integer percentage of `part` relative to completed requests
    #[inline]
    pub fn percent(&self, part: u64) -> u64 {
        if self.completed == 0 {
            0
        } else {
            part.saturating_mul(100) / self.completed
        }
    }
}
