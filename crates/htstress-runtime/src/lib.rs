//! # htstress-runtime
//!
//! Linux implementation of the htstress engine.
//!
//! This crate provides:
//! - `poller` - epoll wrapper and event batches
//! - `waker` - per-worker eventfd used to interrupt a blocked wait
//! - `socket` - raw non-blocking socket syscalls
//! - `slot` - the connection state machine
//! - `worker` - one reactor thread driving many slots
//! - `engine` - spawns the workers and collects the result
//! - `signal` - SIGINT (graceful) / SIGTERM (abort) wiring
//! - `config` - run configuration with env overrides
//! - `report` - final summary rendering
//!
//! ```text
//!            ┌──────────────── Engine ────────────────┐
//!            │  Arc<Target>   Arc<GlobalStats>        │
//!            └───────┬──────────────┬─────────────────┘
//!                    ▼              ▼
//!            ┌─────────────┐  ┌─────────────┐
//!            │  worker 0   │  │  worker N-1 │   one OS thread each
//!            │  epoll      │  │  epoll      │
//!            │  slot × C   │  │  slot × C   │
//!            └─────────────┘  └─────────────┘
//! ```

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "linux"))] {
        compile_error!("htstress-runtime requires Linux (epoll/eventfd)");
    }
}

pub mod config;
pub mod poller;
pub mod waker;
pub mod socket;
pub mod slot;
pub mod worker;
pub mod engine;
pub mod signal;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use config::{DebugFlags, RunConfig};
pub use engine::{Engine, RunOutcome};
pub use report::Report;
pub use worker::{ReactorWorker, WorkerExit};
