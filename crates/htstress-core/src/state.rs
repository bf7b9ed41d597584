//! Connection slot lifecycle

use core::fmt;

/// State of one multiplexed benchmark connection
///
/// ```text
///  Connecting ──writable──▶ Sending ──request sent──▶ Receiving
///      ▲                                                 │
///      └───────────── EOF / socket error (restart) ──────┤
///                                                        ▼
///                                          Closed (ceiling reached)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    /// Non-blocking connect issued, waiting for write readiness
    Connecting = 0,

    /// Request partly written
    Sending = 1,

    /// Request written, draining the response
    Receiving = 2,

    /// No socket; terminal for the rest of the run
    Closed = 3,
}

impl SlotState {
    /// Interested in write readiness
    #[inline]
    pub const fn wants_write(&self) -> bool {
        matches!(self, SlotState::Connecting | SlotState::Sending)
    }

    /// Interested in read readiness
    #[inline]
    pub const fn wants_read(&self) -> bool {
        matches!(self, SlotState::Receiving)
    }

    /// Holds an open socket
    #[inline]
    pub const fn is_open(&self) -> bool {
        !matches!(self, SlotState::Closed)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotState::Connecting => "connecting",
            SlotState::Sending => "sending",
            SlotState::Receiving => "receiving",
            SlotState::Closed => "closed",
        };
        f.write_str(name)
    }
}
