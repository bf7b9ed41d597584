//! # epoll wrapper
//!
//! Level-triggered epoll with `u64` tokens. Slot index N is token N; the
//! worker's wake eventfd uses `WAKE_TOKEN`. Every failure is reported as a
//! `HtsError::Multiplexer` carrying the errno, so the worker can tell an
//! interrupted wait from a fatal one.

use htstress_core::error::{last_errno, HtsError, HtsResult, MultiplexerOp};

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Readiness a registration asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

impl Interest {
    #[inline]
    fn bits(self) -> u32 {
        match self {
            Interest::Read => libc::EPOLLIN as u32,
            Interest::Write => libc::EPOLLOUT as u32,
        }
    }
}

/// One ready notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    token: u64,
    bits: u32,
}

impl Event {
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.bits & libc::EPOLLIN as u32 != 0
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.bits & libc::EPOLLOUT as u32 != 0
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.bits & libc::EPOLLERR as u32 != 0
    }

    #[inline]
    pub fn is_hangup(&self) -> bool {
        self.bits & (libc::EPOLLHUP | libc::EPOLLRDHUP) as u32 != 0
    }
}

/// Reusable buffer for `epoll_wait` results
pub struct Events {
    raw: Vec<libc::epoll_event>,
    len: usize,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: vec![libc::epoll_event { events: 0, u64: 0 }; capacity.max(1)],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Event `i` of the last wait, copied out of the (packed) libc struct
    #[inline]
    pub fn get(&self, i: usize) -> Option<Event> {
        if i >= self.len {
            return None;
        }
        let raw = self.raw[i];
        Some(Event { token: raw.u64, bits: raw.events })
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }
}

/// An epoll instance owned by one worker
pub struct Poller {
    fd: OwnedFd,
}

impl Poller {
    pub fn new() -> HtsResult<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(HtsError::Multiplexer(MultiplexerOp::Create, last_errno()));
        }
        Ok(Self { fd: unsafe { OwnedFd::from_raw_fd(fd) } })
    }

    pub fn add(&self, fd: RawFd, token: u64, interest: Interest) -> HtsResult<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest)
            .map_err(|e| HtsError::Multiplexer(MultiplexerOp::Add, e))
    }

    pub fn modify(&self, fd: RawFd, token: u64, interest: Interest) -> HtsResult<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest)
            .map_err(|e| HtsError::Multiplexer(MultiplexerOp::Modify, e))
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, token: u64, interest: Interest) -> Result<(), i32> {
        let mut ev = libc::epoll_event {
            events: interest.bits(),
            u64: token,
        };
        let ret = unsafe { libc::epoll_ctl(self.fd.as_raw_fd(), op, fd, &mut ev) };
        if ret < 0 {
            return Err(last_errno());
        }
        Ok(())
    }

    /// Block until at least one registration is ready.
    ///
    /// `None` waits indefinitely. Returns the number of events stored.
    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> HtsResult<usize> {
        let timeout_ms = match timeout {
            Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
            None => -1,
        };
        events.len = 0;
        let n = unsafe {
            libc::epoll_wait(
                self.fd.as_raw_fd(),
                events.raw.as_mut_ptr(),
                events.raw.len().min(libc::c_int::MAX as usize) as libc::c_int,
                timeout_ms,
            )
        };
        if n < 0 {
            return Err(HtsError::Multiplexer(MultiplexerOp::Wait, last_errno()));
        }
        events.len = n as usize;
        Ok(events.len)
    }
}

impl AsRawFd for Poller {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
