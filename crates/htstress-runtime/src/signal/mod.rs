//! Process signal wiring
//!
//! SIGINT asks for a graceful finish (report what completed so far), SIGTERM
//! aborts without a report. Both handlers only store to static atomics.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
