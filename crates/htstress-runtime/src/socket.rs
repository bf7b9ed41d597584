//! Raw non-blocking stream sockets
//!
//! The address is converted to a `sockaddr` once per worker and reused for
//! every connect. `connect` treats "in progress" and the transient refusal
//! family as success; the failure then surfaces on the first readiness event
//! and is counted as a socket error by the slot.

use htstress_core::error::{last_errno, HtsError, HtsResult, TargetError};
use htstress_core::TargetAddr;

use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;

/// A `sockaddr_storage` holding an inet or unix address
#[derive(Clone, Copy)]
pub struct RawSockAddr {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

impl RawSockAddr {
    pub fn from_target(addr: &TargetAddr) -> HtsResult<Self> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let len = match addr {
            TargetAddr::Inet(SocketAddr::V4(v4)) => {
                let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                };
                mem::size_of::<libc::sockaddr_in>()
            }
            TargetAddr::Inet(SocketAddr::V6(v6)) => {
                let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = libc::in6_addr { s6_addr: v6.ip().octets() };
                sin6.sin6_scope_id = v6.scope_id();
                mem::size_of::<libc::sockaddr_in6>()
            }
            TargetAddr::Unix(path) => {
                let sun = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_un) };
                let bytes = path.as_os_str().as_bytes();
                // room for the terminating NUL
                if bytes.len() >= sun.sun_path.len() {
                    return Err(TargetError::UnixPathTooLong(bytes.len()).into());
                }
                sun.sun_family = libc::AF_UNIX as libc::sa_family_t;
                for (dst, src) in sun.sun_path.iter_mut().zip(bytes) {
                    *dst = *src as libc::c_char;
                }
                mem::size_of::<libc::sockaddr_un>()
            }
        };
        Ok(Self { storage, len: len as libc::socklen_t })
    }

    #[inline]
    pub fn family(&self) -> libc::c_int {
        self.storage.ss_family as libc::c_int
    }

    #[inline]
    fn as_ptr(&self) -> *const libc::sockaddr {
        &self.storage as *const _ as *const libc::sockaddr
    }
}

// sockaddr_storage has no Debug; family and length identify the address
impl fmt::Debug for RawSockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self.family() {
            libc::AF_INET => "AF_INET",
            libc::AF_INET6 => "AF_INET6",
            libc::AF_UNIX => "AF_UNIX",
            _ => "AF_UNSPEC",
        };
        f.debug_struct("RawSockAddr")
            .field("family", &family)
            .field("len", &self.len)
            .finish()
    }
}

/// New non-blocking, close-on-exec stream socket
pub fn open_stream(family: libc::c_int) -> HtsResult<OwnedFd> {
    let fd = unsafe {
        libc::socket(family, libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC, 0)
    };
    if fd < 0 {
        return Err(HtsError::SocketCreate(last_errno()));
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// errnos after which the slot simply waits for readiness
#[inline]
fn connect_is_transient(errno: i32) -> bool {
    matches!(
        errno,
        libc::EINPROGRESS
            | libc::EAGAIN
            | libc::EINTR
            | libc::ECONNREFUSED
            | libc::ECONNRESET
            | libc::ECONNABORTED
            | libc::ENOENT
            | libc::ETIMEDOUT
            | libc::ENETUNREACH
            | libc::ENETDOWN
            | libc::EHOSTUNREACH
            | libc::EADDRNOTAVAIL
    )
}

pub fn connect(fd: &OwnedFd, addr: &RawSockAddr) -> HtsResult<()> {
    let ret = unsafe { libc::connect(fd.as_raw_fd(), addr.as_ptr(), addr.len) };
    if ret == 0 {
        return Ok(());
    }
    let errno = last_errno();
    if connect_is_transient(errno) {
        Ok(())
    } else {
        Err(HtsError::Connect(errno))
    }
}

/// Result of one send/recv call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Bytes(usize),
    WouldBlock,
    /// Peer closed (recv only)
    Eof,
    Failed(i32),
}

#[inline]
fn classify(ret: isize) -> Transfer {
    if ret > 0 {
        return Transfer::Bytes(ret as usize);
    }
    if ret == 0 {
        return Transfer::Eof;
    }
    match last_errno() {
        libc::EAGAIN | libc::EINTR => Transfer::WouldBlock,
        #[allow(unreachable_patterns)]
        libc::EWOULDBLOCK => Transfer::WouldBlock,
        errno => Transfer::Failed(errno),
    }
}

#[inline]
pub fn send(fd: &OwnedFd, buf: &[u8]) -> Transfer {
    if buf.is_empty() {
        return Transfer::Bytes(0);
    }
    let ret = unsafe {
        libc::send(
            fd.as_raw_fd(),
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            libc::MSG_NOSIGNAL,
        )
    };
    classify(ret)
}

#[inline]
pub fn recv(fd: &OwnedFd, buf: &mut [u8]) -> Transfer {
    let ret = unsafe {
        libc::recv(fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
    };
    classify(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::net::{UnixListener, UnixStream};

    fn owned(stream: UnixStream) -> OwnedFd {
        stream.set_nonblocking(true).unwrap();
        OwnedFd::from(stream)
    }

    #[test]
    fn test_sockaddr_families() {
        let v4 = RawSockAddr::from_target(&TargetAddr::Inet("127.0.0.1:80".parse().unwrap())).unwrap();
        assert_eq!(v4.family(), libc::AF_INET);
        assert_eq!(v4.len as usize, mem::size_of::<libc::sockaddr_in>());

        let v6 = RawSockAddr::from_target(&TargetAddr::Inet("[::1]:80".parse().unwrap())).unwrap();
        assert_eq!(v6.family(), libc::AF_INET6);

        let un = RawSockAddr::from_target(&TargetAddr::Unix("/tmp/x.sock".into())).unwrap();
        assert_eq!(un.family(), libc::AF_UNIX);
    }

    #[test]
    fn test_sockaddr_debug_shows_family() {
        let v4 = RawSockAddr::from_target(&TargetAddr::Inet("127.0.0.1:80".parse().unwrap())).unwrap();
        let shown = format!("{:?}", v4);
        assert!(shown.contains("AF_INET"), "{}", shown);
        assert!(shown.contains(&format!("len: {}", mem::size_of::<libc::sockaddr_in>())), "{}", shown);

        let un = RawSockAddr::from_target(&TargetAddr::Unix("/tmp/x.sock".into())).unwrap();
        assert!(format!("{:?}", un).contains("AF_UNIX"));
    }

    #[test]
    fn test_unix_path_too_long() {
        let long = "/tmp/".to_string() + &"a".repeat(200);
        let err = RawSockAddr::from_target(&TargetAddr::Unix(long.clone().into())).unwrap_err();
        assert_eq!(err, HtsError::Target(TargetError::UnixPathTooLong(long.len())));
    }

    #[test]
    fn test_send_recv_eof() {
        let (a, b) = UnixStream::pair().unwrap();
        let a = owned(a);
        let mut b = b;

        assert_eq!(send(&a, b"ping"), Transfer::Bytes(4));
        let mut got = [0u8; 4];
        b.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"ping");

        let mut buf = [0u8; 16];
        assert_eq!(recv(&a, &mut buf), Transfer::WouldBlock);

        b.write_all(b"pong").unwrap();
        assert_eq!(recv(&a, &mut buf), Transfer::Bytes(4));
        drop(b);
        assert_eq!(recv(&a, &mut buf), Transfer::Eof);
    }

    #[test]
    fn test_send_to_closed_peer_fails() {
        let (a, b) = UnixStream::pair().unwrap();
        let a = owned(a);
        drop(b);
        assert_eq!(send(&a, b"x"), Transfer::Failed(libc::EPIPE));
    }

    #[test]
    fn test_connect_unix() {
        let dir = std::env::temp_dir().join(format!("hts-sock-{}", std::process::id()));
        let _ = std::fs::remove_file(&dir);
        let listener = UnixListener::bind(&dir).unwrap();

        let addr = RawSockAddr::from_target(&TargetAddr::Unix(dir.clone())).unwrap();
        let fd = open_stream(addr.family()).unwrap();
        connect(&fd, &addr).unwrap();
        assert!(listener.accept().is_ok());

        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn test_connect_missing_path_is_transient() {
        let addr = RawSockAddr::from_target(&TargetAddr::Unix("/nonexistent/hts.sock".into())).unwrap();
        let fd = open_stream(addr.family()).unwrap();
        assert!(connect(&fd, &addr).is_ok());
    }
}
