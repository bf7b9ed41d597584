//! Benchmark target: where to connect and what to send

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{HtsResult, TargetError};

/// Resolved endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IPv4 or IPv6 TCP endpoint
    Inet(SocketAddr),
    /// Unix-domain stream socket path
    Unix(PathBuf),
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Inet(addr) => write!(f, "{}", addr),
            TargetAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Immutable target shared read-only by every worker
#[derive(Debug)]
pub struct Target {
    addr: TargetAddr,
    request: Box<[u8]>,
}

impl Target {
    pub fn new(addr: TargetAddr, request: impl Into<Vec<u8>>) -> HtsResult<Self> {
        let request = request.into();
        if request.is_empty() {
            return Err(TargetError::EmptyRequest.into());
        }
        Ok(Self {
            addr,
            request: request.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn addr(&self) -> &TargetAddr {
        &self.addr
    }

    #[inline]
    pub fn request(&self) -> &[u8] {
        &self.request
    }
}

/// `GET <path> HTTP/1.0` with a Host header.
///
/// HTTP/1.0 makes the server close after each response, which is what ends
/// a connection cycle.
pub fn build_get_request(path: &str, host: &str) -> Vec<u8> {
    let path = if path.is_empty() { "/" } else { path };
    format!("GET {} HTTP/1.0\r\nHost: {}\r\n\r\n", path, host).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HtsError;

    #[test]
    fn test_build_get_request() {
        assert_eq!(
            build_get_request("/index.html", "example.com"),
            b"GET /index.html HTTP/1.0\r\nHost: example.com\r\n\r\n".to_vec()
        );
        assert_eq!(
            build_get_request("", "localhost"),
            b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_empty_request_rejected() {
        let addr = TargetAddr::Inet("127.0.0.1:80".parse().unwrap());
        let err = Target::new(addr, Vec::new()).unwrap_err();
        assert_eq!(err, HtsError::Target(TargetError::EmptyRequest));
    }

    #[test]
    fn test_target_accessors() {
        let addr = TargetAddr::Unix(PathBuf::from("/tmp/hts.sock"));
        let target = Target::new(addr.clone(), build_get_request("/", "x")).unwrap();
        assert_eq!(target.addr(), &addr);
        assert!(target.request().starts_with(b"GET / HTTP/1.0"));
        assert_eq!(format!("{}", addr), "unix:/tmp/hts.sock");
    }
}
