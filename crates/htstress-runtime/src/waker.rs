//! `Waker` - eventfd used to pull a worker out of `epoll_wait`.
//!
//! Each worker registers its own eventfd under `WAKE_TOKEN`. When one worker
//! leaves its loop (ceiling reached, fatal error) it writes to every waker so
//! the others re-check the shared stop conditions instead of sleeping on
//! sockets that may never become ready. Multiple `wake()` calls before the
//! worker drains the eventfd collapse into one wakeup.

use htstress_core::error::{last_errno, HtsError, HtsResult};

use std::os::unix::io::{AsRawFd, RawFd};

pub struct Waker {
    fd: RawFd,
}

impl Waker {
    /// Create a new non-blocking eventfd. The waker closes it on drop.
    pub fn new() -> HtsResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(HtsError::Waker(last_errno()));
        }
        Ok(Self { fd })
    }

    pub fn wake(&self) -> HtsResult<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = last_errno();
            // counter saturated: a wakeup is already pending
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(HtsError::Waker(errno));
        }
        Ok(())
    }

    /// Reset the counter so the level-triggered registration goes quiet.
    pub fn drain(&self) {
        let mut val: u64 = 0;
        unsafe {
            libc::read(
                self.fd,
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            );
        }
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd); }
            self.fd = -1;
        }
    }
}

// eventfd writes and reads are thread-safe at the syscall level
unsafe impl Send for Waker {}
unsafe impl Sync for Waker {}

/// One waker per worker, shared by all of them
pub struct WakeSet {
    wakers: Box<[Waker]>,
}

impl WakeSet {
    pub fn new(n: usize) -> HtsResult<Self> {
        let wakers = (0..n).map(|_| Waker::new()).collect::<HtsResult<Vec<_>>>()?;
        Ok(Self { wakers: wakers.into_boxed_slice() })
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<&Waker> {
        self.wakers.get(i)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.wakers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.wakers.is_empty()
    }

    /// Best effort: a failed write only delays that worker until its next
    /// socket event.
    pub fn wake_all(&self) {
        for (i, w) in self.wakers.iter().enumerate() {
            if let Err(e) = w.wake() {
                htstress_core::kwarn!("wake worker {}: {}", i, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::{Events, Interest, Poller};
    use htstress_core::constants::WAKE_TOKEN;
    use std::time::Duration;

    #[test]
    fn test_wake_interrupts_wait() {
        let poller = Poller::new().unwrap();
        let waker = Waker::new().unwrap();
        poller.add(waker.as_raw_fd(), WAKE_TOKEN, Interest::Read).unwrap();

        let mut events = Events::with_capacity(4);
        assert_eq!(poller.wait(&mut events, Some(Duration::from_millis(5))).unwrap(), 0);

        waker.wake().unwrap();
        waker.wake().unwrap();
        assert_eq!(poller.wait(&mut events, Some(Duration::from_secs(1))).unwrap(), 1);
        assert_eq!(events.get(0).unwrap().token(), WAKE_TOKEN);

        waker.drain();
        assert_eq!(poller.wait(&mut events, Some(Duration::from_millis(5))).unwrap(), 0);
    }

    #[test]
    fn test_wake_set() {
        let set = WakeSet::new(3).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.get(3).is_none());

        let poller = Poller::new().unwrap();
        for i in 0..3 {
            poller.add(set.get(i).unwrap().as_raw_fd(), i as u64, Interest::Read).unwrap();
        }
        set.wake_all();

        let mut events = Events::with_capacity(8);
        assert_eq!(poller.wait(&mut events, Some(Duration::from_secs(1))).unwrap(), 3);
    }
}
