//! # Connection slot
//!
//! One slot is one reusable connection position inside a worker. It runs the
//! cycle connect → send request → receive until EOF → classify → reconnect,
//! driven entirely by readiness events.
//!
//! ```text
//!   open() ──► Connecting ──writable──► Sending ──request done──► Receiving
//!                  │                       │                         │
//!                  └──── error ────────────┴──────── error ──────────┤
//!                                                                    │ EOF
//!            socket error: count, reopen            counted: reopen  ▼
//!            ceiling full: Closed                   last/discarded: Closed
//! ```
//!
//! A socket error never ends the run. Only failures to create a socket,
//! start a connect, or talk to epoll are returned as `Err`.

use htstress_core::error::HtsResult;
use htstress_core::kprint;
use htstress_core::{GlobalStats, Issue, RateController, SlotState, StatusProbe};

use std::os::fd::{AsRawFd, OwnedFd};

use crate::config::DebugFlags;
use crate::poller::{Event, Interest, Poller};
use crate::socket::{self, RawSockAddr, Transfer};

/// Everything a slot borrows from its worker while handling one event
pub struct SlotContext<'a> {
    pub poller: &'a Poller,
    pub addr: &'a RawSockAddr,
    pub request: &'a [u8],
    pub stats: &'a GlobalStats,
    pub rate: &'a RateController,
    pub buf: &'a mut [u8],
    pub debug: DebugFlags,
}

/// What the send/recv pass decided
enum Step {
    Wait,
    Complete,
    Fail,
}

#[derive(Debug)]
pub struct ConnectionSlot {
    token: u64,
    fd: Option<OwnedFd>,
    state: SlotState,
    /// Request bytes already written in this cycle
    sent: usize,
    probe: StatusProbe,
}

impl ConnectionSlot {
    pub fn new(token: u64) -> Self {
        Self {
            token,
            fd: None,
            state: SlotState::Closed,
            sent: 0,
            probe: StatusProbe::new(),
        }
    }

    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Start a fresh connection cycle, replacing any previous socket
    pub fn open(&mut self, cx: &mut SlotContext<'_>) -> HtsResult<()> {
        self.close();
        let fd = socket::open_stream(cx.addr.family())?;
        socket::connect(&fd, cx.addr)?;
        cx.poller.add(fd.as_raw_fd(), self.token, Interest::Write)?;
        self.fd = Some(fd);
        self.sent = 0;
        self.probe.reset();
        self.state = SlotState::Connecting;
        Ok(())
    }

    /// Closing the descriptor also drops its epoll registration
    fn close(&mut self) {
        self.fd = None;
        self.state = SlotState::Closed;
    }

    /// Advance the state machine for one readiness event
    pub fn on_event(&mut self, ev: Event, cx: &mut SlotContext<'_>) -> HtsResult<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        if ev.is_error() {
            return self.recover(cx);
        }

        let state = self.state;
        let step = if state.wants_write() && (ev.is_writable() || ev.is_hangup()) {
            self.send_request(cx)?
        } else if state.wants_read() && (ev.is_readable() || ev.is_hangup()) {
            self.read_response(cx)
        } else {
            Step::Wait
        };

        match step {
            Step::Wait => Ok(()),
            Step::Complete => self.complete(cx),
            Step::Fail => self.recover(cx),
        }
    }

    fn send_request(&mut self, cx: &mut SlotContext<'_>) -> HtsResult<Step> {
        let Some(fd) = self.fd.as_ref() else {
            return Ok(Step::Wait);
        };
        self.state = SlotState::Sending;
        loop {
            let rest = &cx.request[self.sent..];
            match socket::send(fd, rest) {
                Transfer::Bytes(n) => {
                    if cx.debug.request {
                        kprint::dump(&rest[..n]);
                    }
                    self.sent += n;
                    if self.sent >= cx.request.len() {
                        cx.poller.modify(fd.as_raw_fd(), self.token, Interest::Read)?;
                        self.state = SlotState::Receiving;
                        return Ok(Step::Wait);
                    }
                }
                Transfer::WouldBlock => return Ok(Step::Wait),
                Transfer::Eof | Transfer::Failed(_) => return Ok(Step::Fail),
            }
        }
    }

    fn read_response(&mut self, cx: &mut SlotContext<'_>) -> Step {
        let Some(fd) = self.fd.as_ref() else {
            return Step::Wait;
        };
        loop {
            match socket::recv(fd, cx.buf) {
                Transfer::Bytes(n) => {
                    let chunk = &cx.buf[..n];
                    if cx.debug.response {
                        kprint::dump(chunk);
                    }
                    self.probe.feed(chunk);
                }
                Transfer::WouldBlock => return Step::Wait,
                Transfer::Eof => return Step::Complete,
                Transfer::Failed(_) => return Step::Fail,
            }
        }
    }

    /// Peer closed after the response; claim it against the ceiling.
    ///
    /// Transfer bytes are credited only to counted cycles, so discarded
    /// overshoot and failed cycles never show up in the byte totals.
    fn complete(&mut self, cx: &mut SlotContext<'_>) -> HtsResult<()> {
        self.close();
        if self.probe.consumed() == 0 {
            return self.recover(cx);
        }
        match cx.stats.try_issue() {
            Issue::Discarded => Ok(()),
            Issue::Counted { completed, last } => {
                cx.stats.record_outcome(self.probe.outcome());
                cx.stats.record_sent(self.sent);
                cx.stats.record_received(self.probe.consumed() as usize);
                cx.rate.observe(completed);
                if last {
                    Ok(())
                } else {
                    self.open(cx)
                }
            }
        }
    }

    /// Count a socket error and start over unless the run is full
    fn recover(&mut self, cx: &mut SlotContext<'_>) -> HtsResult<()> {
        cx.stats.record_socket_error();
        self.close();
        if cx.stats.ceiling_reached() {
            return Ok(());
        }
        self.open(cx)
    }
}
