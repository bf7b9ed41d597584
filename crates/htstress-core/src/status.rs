//! Incremental HTTP status-class probe
//!
//! A response arrives in arbitrarily sized receive chunks. The probe only
//! needs the leading digit of the three-digit status code, which sits at a
//! fixed byte offset in the status line (`HTTP/1.1 404 Not Found`). It keeps
//! the number of bytes consumed so far so the digit is found even when it is
//! the first byte of a later chunk.

use crate::constants::STATUS_DIGIT_OFFSET;

/// Measured result of one completed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Anything that is not a 4xx/5xx status
    Good,
    /// 4xx or 5xx status
    Bad,
}

/// Per-connection response state carried across receive calls
#[derive(Debug, Clone, Default)]
pub struct StatusProbe {
    consumed: u64,
    bad: bool,
}

impl StatusProbe {
    pub const fn new() -> Self {
        Self { consumed: 0, bad: false }
    }

    /// Account for one received chunk
    #[inline]
    pub fn feed(&mut self, chunk: &[u8]) {
        let end = self.consumed + chunk.len() as u64;
        if self.consumed <= STATUS_DIGIT_OFFSET && STATUS_DIGIT_OFFSET < end {
            let digit = chunk[(STATUS_DIGIT_OFFSET - self.consumed) as usize];
            if matches!(digit, b'4' | b'5') {
                self.bad = true;
            }
        }
        self.consumed = end;
    }

    /// Bytes of the current response seen so far
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[inline]
    pub fn outcome(&self) -> Outcome {
        if self.bad {
            Outcome::Bad
        } else {
            Outcome::Good
        }
    }

    /// Forget the previous response (new connection cycle)
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
