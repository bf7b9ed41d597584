//! # Reactor worker
//!
//! One worker owns one epoll instance and `concurrency` connection slots and
//! runs on its own OS thread. Workers share nothing mutable except the
//! `GlobalStats` counters and the shutdown flags.
//!
//! Loop order per iteration:
//!
//! 1. abort requested → leave immediately
//! 2. graceful finish requested → freeze the ceiling at the completed count
//! 3. ceiling full, or every slot closed → leave
//! 4. wait for readiness and dispatch each event to its slot
//!
//! The wait has no timeout. Whoever changes a stop condition writes to the
//! workers' eventfds (see `WakeSet`), and a signal interrupts the wait with
//! `EINTR` on whichever thread receives it.

use htstress_core::constants::WAKE_TOKEN;
use htstress_core::error::HtsResult;
use htstress_core::{kdebug, ktrace, kwarn};
use htstress_core::{GlobalStats, RateController, ShutdownSignal, Target};

use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use crate::config::{DebugFlags, RunConfig};
use crate::poller::{Events, Interest, Poller};
use crate::slot::{ConnectionSlot, SlotContext};
use crate::socket::RawSockAddr;
use crate::waker::WakeSet;

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Ceiling reached or graceful finish observed
    Finished,
    /// Abort requested; open sockets were dropped as-is
    Aborted,
}

pub struct ReactorWorker {
    id: usize,
    poller: Poller,
    events: Events,
    slots: Vec<ConnectionSlot>,
    buf: Box<[u8]>,
    addr: RawSockAddr,
    target: Arc<Target>,
    stats: Arc<GlobalStats>,
    rate: RateController,
    halt: ShutdownSignal,
    wakers: Arc<WakeSet>,
    debug: DebugFlags,
}

impl ReactorWorker {
    /// Build a worker on the calling thread; nothing is connected yet.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        config: &RunConfig,
        addr: RawSockAddr,
        target: Arc<Target>,
        stats: Arc<GlobalStats>,
        rate: RateController,
        halt: ShutdownSignal,
        wakers: Arc<WakeSet>,
    ) -> HtsResult<Self> {
        let poller = Poller::new()?;
        if let Some(waker) = wakers.get(id) {
            poller.add(waker.as_raw_fd(), WAKE_TOKEN, Interest::Read)?;
        }
        let slots = (0..config.concurrency)
            .map(|i| ConnectionSlot::new(i as u64))
            .collect();

        Ok(Self {
            id,
            poller,
            events: Events::with_capacity(config.max_events),
            slots,
            buf: vec![0u8; config.recv_buf_size].into_boxed_slice(),
            addr,
            target,
            stats,
            rate,
            halt,
            wakers,
            debug: config.debug,
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Drive all slots until a stop condition holds.
    ///
    /// Socket-level failures are counted and retried inside the slots; an
    /// `Err` here is fatal for the whole run.
    pub fn run(&mut self) -> HtsResult<WorkerExit> {
        let Self {
            id,
            poller,
            events,
            slots,
            buf,
            addr,
            target,
            stats,
            rate,
            halt,
            wakers,
            debug,
        } = self;

        let mut cx = SlotContext {
            poller,
            addr,
            request: target.request(),
            stats,
            rate,
            buf,
            debug: *debug,
        };

        for slot in slots.iter_mut() {
            slot.open(&mut cx)?;
        }
        let mut open = slots.len();
        kdebug!("worker {} started with {} connections", id, open);

        loop {
            if halt.abort_requested() {
                kdebug!("worker {} aborting", id);
                return Ok(WorkerExit::Aborted);
            }
            if halt.finish_requested() {
                let ceiling = cx.stats.finish_now();
                ktrace!("worker {} finishing at {}", id, ceiling);
            }
            if cx.stats.ceiling_reached() || open == 0 {
                kdebug!("worker {} finished", id);
                return Ok(WorkerExit::Finished);
            }

            let n = match cx.poller.wait(events, None) {
                Ok(n) => n,
                Err(e) if e.is_interrupted() => continue,
                Err(e) => return Err(e),
            };

            for i in 0..n {
                let Some(ev) = events.get(i) else { break };
                if ev.token() == WAKE_TOKEN {
                    if let Some(w) = wakers.get(*id) {
                        w.drain();
                    }
                    continue;
                }
                let Some(slot) = slots.get_mut(ev.token() as usize) else {
                    kwarn!("worker {}: event for unknown slot {}", id, ev.token());
                    continue;
                };
                let was_open = slot.is_open();
                slot.on_event(ev, &mut cx)?;
                if was_open && !slot.is_open() {
                    open -= 1;
                }
            }
        }
    }
}
