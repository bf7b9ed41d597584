//! Library defaults for `RunConfig`

/// Connections multiplexed by each worker
pub const CONCURRENCY: usize = 1;

/// Worker threads
pub const NUM_THREADS: usize = 1;

/// Completion ceiling (0 = run until interrupted)
pub const MAX_REQUESTS: u64 = 0;

/// epoll events drained per wait
pub const MAX_EVENTS: usize = 256;

/// Receive scratch buffer per worker
pub const RECV_BUF_SIZE: usize = 1024;

/// Dump request/response bytes to stderr
pub const DEBUG: bool = false;
