//! # htstress-core
//!
//! Core types for the htstress HTTP load generator.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The epoll reactor, sockets and signal wiring live in `htstress-runtime`.
//!
//! ## Modules
//!
//! - `stats` - Lock-free run counters and the completion ceiling
//! - `shutdown` - Abort / graceful-finish flags observed by workers
//! - `rate` - Progress cadence and throughput math
//! - `status` - Incremental status-class probe for HTTP responses
//! - `state` - Connection slot lifecycle states
//! - `target` - Benchmark target and request buffer
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod stats;
pub mod shutdown;
pub mod rate;
pub mod status;
pub mod state;
pub mod target;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use stats::{GlobalStats, Issue, StatsSnapshot};
pub use shutdown::{ShutdownFlags, ShutdownSignal};
pub use rate::RateController;
pub use status::{Outcome, StatusProbe};
pub use state::SlotState;
pub use target::{build_get_request, Target, TargetAddr};
pub use error::{ConfigError, HtsError, HtsResult, MultiplexerOp, TargetError, WorkerError};
pub use env::{env_get, env_get_bool};

/// Tunables shared by the engine and the binary
pub mod constants {
    /// Byte offset of the leading status digit in `HTTP/1.x NNN ...`
    pub const STATUS_DIGIT_OFFSET: u64 = 9;

    /// Progress cadence used when the run has no request ceiling
    pub const DEFAULT_TICK: u64 = 1000;

    /// Number of progress lines a bounded run prints
    pub const PROGRESS_STEPS: u64 = 10;

    /// Upper bound on worker threads
    pub const MAX_THREADS: usize = 256;

    /// epoll token reserved for the per-worker wake eventfd
    pub const WAKE_TOKEN: u64 = u64::MAX;
}
