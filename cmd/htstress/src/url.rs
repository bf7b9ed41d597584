//! `[http://]host[:port][/path]` decomposition and address selection

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

const DEFAULT_PORT: u16 = 80;

/// How long a candidate address may take to accept the probe connection
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Address family restriction from `-4` / `-6`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Family {
    #[default]
    Any,
    V4,
    V6,
}

impl Family {
    fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => addr.is_ipv4(),
            Family::V6 => addr.is_ipv6(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub node: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug)]
pub enum UrlError {
    /// No host in the URL
    MissingHost(String),
    /// Port is not a number in 1..=65535
    BadPort(String),
    /// Name lookup failed
    Resolve(String, io::Error),
    /// Lookup succeeded but nothing matched the requested family
    NoAddress(String),
    /// Every candidate refused the probe connection
    Unreachable(String, io::Error),
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlError::MissingHost(url) => write!(f, "no host in URL '{}'", url),
            UrlError::BadPort(port) => write!(f, "invalid port '{}'", port),
            UrlError::Resolve(node, e) => write!(f, "cannot resolve '{}': {}", node, e),
            UrlError::NoAddress(node) => write!(f, "no address of the requested family for '{}'", node),
            UrlError::Unreachable(node, e) => write!(f, "cannot connect to '{}': {}", node, e),
        }
    }
}

impl std::error::Error for UrlError {}

/// Split a target URL. Only plain `http://` is understood; the prefix is
/// optional. IPv6 literals go in brackets: `http://[::1]:8080/`.
pub fn parse(url: &str) -> Result<UrlParts, UrlError> {
    let rest = url.strip_prefix("http://").unwrap_or(url);

    let (node, rest) = if let Some(inner) = rest.strip_prefix('[') {
        match inner.find(']') {
            Some(i) => (&inner[..i], &inner[i + 1..]),
            None => return Err(UrlError::MissingHost(url.to_string())),
        }
    } else {
        let end = rest.find([':', '/']).unwrap_or(rest.len());
        (&rest[..end], &rest[end..])
    };
    if node.is_empty() {
        return Err(UrlError::MissingHost(url.to_string()));
    }

    let (port, path) = match rest.strip_prefix(':') {
        Some(after) => {
            let end = after.find('/').unwrap_or(after.len());
            let digits = &after[..end];
            let port = digits
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| UrlError::BadPort(digits.to_string()))?;
            (port, &after[end..])
        }
        None => (DEFAULT_PORT, rest),
    };

    Ok(UrlParts {
        node: node.to_string(),
        port,
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
    })
}

/// Resolve the node and keep the first candidate that accepts a connection
pub fn resolve(parts: &UrlParts, family: Family) -> Result<SocketAddr, UrlError> {
    let candidates: Vec<SocketAddr> = (parts.node.as_str(), parts.port)
        .to_socket_addrs()
        .map_err(|e| UrlError::Resolve(parts.node.clone(), e))?
        .filter(|a| family.admits(a))
        .collect();

    let mut last_err = None;
    for addr in candidates {
        match TcpStream::connect_timeout(&addr, PROBE_TIMEOUT) {
            Ok(_) => return Ok(addr),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(UrlError::Unreachable(parts.node.clone(), e)),
        None => Err(UrlError::NoAddress(parts.node.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn parts(node: &str, port: u16, path: &str) -> UrlParts {
        UrlParts { node: node.into(), port, path: path.into() }
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse("http://example.com/a/b?q=1").unwrap(), parts("example.com", 80, "/a/b?q=1"));
        assert_eq!(parse("example.com").unwrap(), parts("example.com", 80, "/"));
        assert_eq!(parse("localhost:8080").unwrap(), parts("localhost", 8080, "/"));
        assert_eq!(parse("http://10.0.0.1:81/x").unwrap(), parts("10.0.0.1", 81, "/x"));
        assert_eq!(parse("http://[::1]:8080/").unwrap(), parts("::1", 8080, "/"));
        assert_eq!(parse("[fe80::1]").unwrap(), parts("fe80::1", 80, "/"));
    }

    #[test]
    fn test_parse_rejects() {
        assert!(matches!(parse("http://"), Err(UrlError::MissingHost(_))));
        assert!(matches!(parse(":80/"), Err(UrlError::MissingHost(_))));
        assert!(matches!(parse("host:http/"), Err(UrlError::BadPort(p)) if p == "http"));
        assert!(matches!(parse("host:0"), Err(UrlError::BadPort(_))));
        assert!(matches!(parse("host:70000"), Err(UrlError::BadPort(_))));
        assert!(matches!(parse("[::1"), Err(UrlError::MissingHost(_))));
    }

    #[test]
    fn test_resolve_probes_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let addr = resolve(&parts("127.0.0.1", port, "/"), Family::Any).unwrap();
        assert_eq!(addr, listener.local_addr().unwrap());

        assert!(matches!(
            resolve(&parts("127.0.0.1", port, "/"), Family::V6),
            Err(UrlError::NoAddress(_))
        ));
    }

    #[test]
    fn test_resolve_nothing_listening() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        assert!(matches!(
            resolve(&parts("127.0.0.1", port, "/"), Family::V4),
            Err(UrlError::Unreachable(..))
        ));
    }
}
