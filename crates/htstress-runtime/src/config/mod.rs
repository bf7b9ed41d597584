//! Run configuration
//!
//! Library defaults with runtime environment overrides; the binary applies
//! command-line flags on top through the builder methods.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls (command line)
//! 2. Environment variables
//! 3. Library defaults (`defaults.rs`)
//!
//! ```rust,ignore
//! use htstress_runtime::RunConfig;
//!
//! let config = RunConfig::from_env()
//!     .concurrency(64)
//!     .num_threads(4)
//!     .max_requests(100_000);
//! config.validate()?;
//! ```

pub mod defaults;

use htstress_core::constants::MAX_THREADS;
use htstress_core::env::{env_get, env_get_bool};
use htstress_core::error::ConfigError;
use htstress_core::kwarn;

/// What to echo to stderr while running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    /// Every request chunk as it is sent
    pub request: bool,
    /// Every response chunk as it is received
    pub response: bool,
}

impl DebugFlags {
    pub const fn all() -> Self {
        Self { request: true, response: true }
    }
}

/// Parameters of one benchmark run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Connections multiplexed by each worker
    pub concurrency: usize,
    /// Worker threads
    pub num_threads: usize,
    /// Completion ceiling, 0 = unbounded
    pub max_requests: u64,
    /// epoll events drained per wait
    pub max_events: usize,
    /// Receive scratch buffer per worker
    pub recv_buf_size: usize,
    /// Request/response dumps
    pub debug: DebugFlags,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RunConfig {
    /// Library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `HTS_CONCURRENCY` - Connections per worker
    /// - `HTS_THREADS` - Worker threads
    /// - `HTS_MAX_REQUESTS` - Completion ceiling (0 = unbounded)
    /// - `HTS_MAX_EVENTS` - epoll batch size
    /// - `HTS_RECV_BUF` - Receive buffer size in bytes
    /// - `HTS_DEBUG` - Dump request and response bytes (0/1)
    pub fn from_env() -> Self {
        let debug = env_get_bool("HTS_DEBUG", defaults::DEBUG);
        Self {
            concurrency: env_get("HTS_CONCURRENCY", defaults::CONCURRENCY),
            num_threads: env_get("HTS_THREADS", defaults::NUM_THREADS),
            max_requests: env_get("HTS_MAX_REQUESTS", defaults::MAX_REQUESTS),
            max_events: env_get("HTS_MAX_EVENTS", defaults::MAX_EVENTS),
            recv_buf_size: env_get("HTS_RECV_BUF", defaults::RECV_BUF_SIZE),
            debug: if debug { DebugFlags::all() } else { DebugFlags::default() },
        }
    }

    /// Library defaults only, ignoring the environment
    pub fn new() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            num_threads: defaults::NUM_THREADS,
            max_requests: defaults::MAX_REQUESTS,
            max_events: defaults::MAX_EVENTS,
            recv_buf_size: defaults::RECV_BUF_SIZE,
            debug: DebugFlags::default(),
        }
    }

    // Builder methods

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn max_requests(mut self, n: u64) -> Self {
        self.max_requests = n;
        self
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    pub fn recv_buf_size(mut self, n: usize) -> Self {
        self.recv_buf_size = n;
        self
    }

    pub fn debug(mut self, flags: DebugFlags) -> Self {
        self.debug = flags;
        self
    }

    /// Total sockets the run may hold open at once
    #[inline]
    pub fn total_connections(&self) -> usize {
        self.concurrency.saturating_mul(self.num_threads)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.num_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.num_threads > MAX_THREADS {
            return Err(ConfigError::TooManyThreads(self.num_threads));
        }
        // slot indices double as epoll tokens; u32::MAX keeps clear of the wake token
        match self.concurrency.checked_mul(self.num_threads) {
            Some(total) if total <= u32::MAX as usize => {}
            _ => return Err(ConfigError::TooManyConnections),
        }
        if self.max_events == 0 {
            return Err(ConfigError::ZeroMaxEvents);
        }
        if self.recv_buf_size == 0 {
            return Err(ConfigError::ZeroRecvBuffer);
        }
        Ok(())
    }

    /// Warn when the open-file limit cannot hold every socket of the run.
    ///
    /// Each worker also needs an epoll fd and an eventfd.
    pub fn check_fd_budget(&self) {
        let mut lim = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
        let ret = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) };
        if ret != 0 || lim.rlim_cur == libc::RLIM_INFINITY {
            return;
        }
        let needed = self.total_connections() as u64 + 2 * self.num_threads as u64 + 16;
        if needed > lim.rlim_cur as u64 {
            kwarn!(
                "{} sockets requested but RLIMIT_NOFILE is {}; expect socket() failures",
                self.total_connections(),
                lim.rlim_cur
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = RunConfig::new();
        assert_eq!(config.concurrency, defaults::CONCURRENCY);
        assert_eq!(config.max_requests, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::new()
            .concurrency(32)
            .num_threads(4)
            .max_requests(1000)
            .debug(DebugFlags::all());
        assert_eq!(config.total_connections(), 128);
        assert_eq!(config.max_requests, 1000);
        assert!(config.debug.request && config.debug.response);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        assert_eq!(
            RunConfig::new().concurrency(0).validate(),
            Err(ConfigError::ZeroConcurrency)
        );
        assert_eq!(
            RunConfig::new().num_threads(0).validate(),
            Err(ConfigError::ZeroThreads)
        );
        assert_eq!(
            RunConfig::new().num_threads(MAX_THREADS + 1).validate(),
            Err(ConfigError::TooManyThreads(MAX_THREADS + 1))
        );
        assert_eq!(
            RunConfig::new().concurrency(usize::MAX).num_threads(2).validate(),
            Err(ConfigError::TooManyConnections)
        );
        assert_eq!(
            RunConfig::new().max_events(0).validate(),
            Err(ConfigError::ZeroMaxEvents)
        );
        assert_eq!(
            RunConfig::new().recv_buf_size(0).validate(),
            Err(ConfigError::ZeroRecvBuffer)
        );
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("HTS_CONCURRENCY", "17");
        std::env::set_var("HTS_MAX_EVENTS", "not-a-number");
        let config = RunConfig::from_env();
        assert_eq!(config.concurrency, 17);
        assert_eq!(config.max_events, defaults::MAX_EVENTS);
        std::env::remove_var("HTS_CONCURRENCY");
        std::env::remove_var("HTS_MAX_EVENTS");
    }
}
