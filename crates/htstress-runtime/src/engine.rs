//! # Engine
//!
//! Builds one `ReactorWorker` per thread, runs them, and turns their exits
//! into a `RunOutcome`.
//!
//! ## Lifecycle
//!
//! 1. Validate the configuration and convert the target address once
//! 2. Build every worker (epoll, wake eventfd, slots) on the calling thread
//! 3. Spawn `htstress-worker-N` threads
//! 4. Block SIGINT/SIGTERM on the calling thread and wait for exits
//! 5. Join, then read the final counters
//!
//! The first exit stamps the elapsed time: a bounded run is over as soon as
//! one worker sees the ceiling full.

use htstress_core::error::{HtsResult, WorkerError};
use htstress_core::{kdebug, kerror, kwarn};
use htstress_core::{GlobalStats, RateController, ShutdownSignal, StatsSnapshot, Target};

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::signal;
use crate::socket::RawSockAddr;
use crate::waker::WakeSet;
use crate::worker::{ReactorWorker, WorkerExit};

/// How often the coordinator re-checks the shutdown flags while waiting
const COORDINATOR_POLL: Duration = Duration::from_millis(50);

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    pub snapshot: StatsSnapshot,
    pub elapsed: Duration,
    /// Ceiling in force at the end; a graceful finish makes this `Some`
    pub limit: Option<u64>,
    /// SIGTERM (or an explicit abort) ended the run; no report is due
    pub aborted: bool,
}

pub struct Engine {
    config: RunConfig,
    target: Arc<Target>,
    stats: Arc<GlobalStats>,
    shutdown: ShutdownSignal,
}

impl Engine {
    pub fn new(config: RunConfig, target: Target, shutdown: ShutdownSignal) -> HtsResult<Self> {
        config.validate()?;
        config.check_fd_budget();
        let stats = Arc::new(GlobalStats::new(config.max_requests));
        Ok(Self {
            config,
            target: Arc::new(target),
            stats,
            shutdown,
        })
    }

    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Live counters, readable while `run` is in progress
    #[inline]
    pub fn stats(&self) -> &Arc<GlobalStats> {
        &self.stats
    }

    pub fn run(&self) -> HtsResult<RunOutcome> {
        let addr = RawSockAddr::from_target(self.target.addr())?;
        let rate = RateController::new(self.config.max_requests);
        // worker failures abort the run without touching the caller's signal
        let halt = self.shutdown.child();
        let wakers = Arc::new(WakeSet::new(self.config.num_threads)?);

        let mut workers = Vec::with_capacity(self.config.num_threads);
        for id in 0..self.config.num_threads {
            workers.push(ReactorWorker::new(
                id,
                &self.config,
                addr,
                Arc::clone(&self.target),
                Arc::clone(&self.stats),
                rate,
                halt.clone(),
                Arc::clone(&wakers),
            )?);
        }

        kdebug!(
            "starting {} workers × {} connections against {}",
            self.config.num_threads,
            self.config.concurrency,
            self.target.addr()
        );

        let (tx, rx) = mpsc::channel::<HtsResult<WorkerExit>>();
        let start = Instant::now();
        let mut handles = Vec::with_capacity(workers.len());

        for mut worker in workers {
            let id = worker.id();
            let tx = tx.clone();
            let thread_halt = halt.clone();
            let thread_wakers = Arc::clone(&wakers);
            let spawned = thread::Builder::new()
                .name(format!("htstress-worker-{}", id))
                .spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| worker.run()))
                        .unwrap_or_else(|_| Err(WorkerError::Panicked.into()));
                    if let Err(e) = &result {
                        kerror!("worker {}: {}", id, e);
                        thread_halt.request_abort();
                    }
                    thread_wakers.wake_all();
                    let _ = tx.send(result);
                });

            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    kerror!("failed to spawn worker {}: {}", id, e);
                    halt.request_abort();
                    wakers.wake_all();
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(WorkerError::SpawnFailed.into());
                }
            }
        }
        drop(tx);

        let _mask = match signal::block_termination_signals() {
            Ok(guard) => Some(guard),
            Err(e) => {
                kwarn!("{}", e);
                None
            }
        };

        let mut elapsed = None;
        let mut first_error = None;
        let mut aborted = false;
        let mut seen = (false, false);
        let mut remaining = handles.len();

        while remaining > 0 {
            match rx.recv_timeout(COORDINATOR_POLL) {
                Ok(result) => {
                    remaining -= 1;
                    elapsed.get_or_insert_with(|| start.elapsed());
                    match result {
                        Ok(WorkerExit::Finished) => {}
                        Ok(WorkerExit::Aborted) => aborted = true,
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    // a worker parked on silent sockets only notices a flag when woken
                    let now = (halt.abort_requested(), halt.finish_requested());
                    if now != seen {
                        seen = now;
                        wakers.wake_all();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for h in handles {
            if h.join().is_err() {
                first_error.get_or_insert(WorkerError::Panicked.into());
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(RunOutcome {
            snapshot: self.stats.snapshot(),
            elapsed: elapsed.unwrap_or_else(|| start.elapsed()),
            limit: self.stats.limit(),
            aborted: aborted || self.shutdown.abort_requested(),
        })
    }
}
