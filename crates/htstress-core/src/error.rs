//! Error types for the load generator
//!
//! Only conditions that end the whole run are represented here. Per-connection
//! socket failures are absorbed by the connection slot and show up as the
//! `socket_errors` counter instead.

use core::fmt;

/// Result type for engine operations
pub type HtsResult<T> = Result<T, HtsError>;

/// Errors that terminate a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtsError {
    /// epoll create/ctl/wait failed with the given errno
    Multiplexer(MultiplexerOp, i32),

    /// socket(2) failed
    SocketCreate(i32),

    /// connect(2) failed with an errno outside the transient set
    Connect(i32),

    /// eventfd could not be created or signalled
    Waker(i32),

    /// Signal handler installation or masking failed
    SignalSetup(i32),

    /// Worker thread error
    Worker(WorkerError),

    /// Rejected run configuration
    Config(ConfigError),

    /// Unusable benchmark target
    Target(TargetError),
}

impl HtsError {
    /// True for an epoll_wait that was cut short by a signal
    #[inline]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, HtsError::Multiplexer(MultiplexerOp::Wait, errno) if *errno == EINTR)
    }
}

// Keeps this crate free of libc; the value is identical on every Linux ABI.
const EINTR: i32 = 4;

fn errno_text(errno: i32) -> std::io::Error {
    std::io::Error::from_raw_os_error(errno)
}

impl fmt::Display for HtsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtsError::Multiplexer(op, e) => write!(f, "epoll {}: {}", op, errno_text(*e)),
            HtsError::SocketCreate(e) => write!(f, "socket() failed: {}", errno_text(*e)),
            HtsError::Connect(e) => write!(f, "connect() failed: {}", errno_text(*e)),
            HtsError::Waker(e) => write!(f, "eventfd: {}", errno_text(*e)),
            HtsError::SignalSetup(e) => write!(f, "signal setup failed: {}", errno_text(*e)),
            HtsError::Worker(e) => write!(f, "worker error: {}", e),
            HtsError::Config(e) => write!(f, "invalid configuration: {}", e),
            HtsError::Target(e) => write!(f, "invalid target: {}", e),
        }
    }
}

impl std::error::Error for HtsError {}

/// Which multiplexer call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplexerOp {
    Create,
    Add,
    Modify,
    Wait,
}

impl fmt::Display for MultiplexerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MultiplexerOp::Create => "create",
            MultiplexerOp::Add => "ctl(ADD)",
            MultiplexerOp::Modify => "ctl(MOD)",
            MultiplexerOp::Wait => "wait",
        };
        f.write_str(name)
    }
}

/// Worker thread related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Failed to spawn worker thread
    SpawnFailed,

    /// Worker thread panicked
    Panicked,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::SpawnFailed => write!(f, "failed to spawn worker thread"),
            WorkerError::Panicked => write!(f, "worker thread panicked"),
        }
    }
}

impl From<WorkerError> for HtsError {
    fn from(e: WorkerError) -> Self {
        HtsError::Worker(e)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// concurrency must be at least 1
    ZeroConcurrency,

    /// num_threads must be at least 1
    ZeroThreads,

    /// num_threads above the supported maximum
    TooManyThreads(usize),

    /// concurrency × threads does not fit the slot index space
    TooManyConnections,

    /// epoll batch size must be at least 1
    ZeroMaxEvents,

    /// receive scratch buffer must be at least 1 byte
    ZeroRecvBuffer,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroConcurrency => write!(f, "concurrency must be at least 1"),
            ConfigError::ZeroThreads => write!(f, "threads must be at least 1"),
            ConfigError::TooManyThreads(n) => write!(f, "{} threads exceeds the maximum", n),
            ConfigError::TooManyConnections => write!(f, "concurrency × threads is too large"),
            ConfigError::ZeroMaxEvents => write!(f, "max events per wait must be at least 1"),
            ConfigError::ZeroRecvBuffer => write!(f, "receive buffer must be at least 1 byte"),
        }
    }
}

impl From<ConfigError> for HtsError {
    fn from(e: ConfigError) -> Self {
        HtsError::Config(e)
    }
}

/// Target construction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Request buffer is empty
    EmptyRequest,

    /// Unix socket path does not fit in sockaddr_un
    UnixPathTooLong(usize),
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::EmptyRequest => write!(f, "request buffer is empty"),
            TargetError::UnixPathTooLong(n) => {
                write!(f, "unix socket path of {} bytes is too long", n)
            }
        }
    }
}

impl From<TargetError> for HtsError {
    fn from(e: TargetError) -> Self {
        HtsError::Target(e)
    }
}

/// errno of the last failed libc call on this thread
#[inline]
pub fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
