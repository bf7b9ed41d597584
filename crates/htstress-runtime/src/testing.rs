//! In-process HTTP servers for engine tests
//!
//! Thread-per-connection, blocking std sockets. Every handler decrements the
//! active count before it drops the stream, so a client can never observe
//! EOF on a connection the server still counts as active.

use htstress_core::TargetAddr;

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) const OK_RESPONSE: &[u8] =
    b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello";
pub(crate) const NOT_FOUND_RESPONSE: &[u8] =
    b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    /// Read the request, write the response, close
    Respond(&'static [u8]),
    /// Same, but the status digit starts a second write
    SplitAtStatus(&'static [u8]),
    /// Read the request and close without a byte of response
    CloseAfterRequest,
    /// Close right after accept
    CloseImmediately,
}

#[derive(Debug, Default)]
pub(crate) struct ServerCounters {
    accepted: AtomicU64,
    active: AtomicU64,
    max_active: AtomicU64,
}

impl ServerCounters {
    fn enter(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

trait Conn: Read + Write + Send {
    fn close_write(&self);
    fn no_delay(&self);
}

impl Conn for TcpStream {
    fn close_write(&self) {
        let _ = self.shutdown(Shutdown::Write);
    }
    fn no_delay(&self) {
        let _ = self.set_nodelay(true);
    }
}

impl Conn for UnixStream {
    fn close_write(&self) {
        let _ = self.shutdown(Shutdown::Write);
    }
    fn no_delay(&self) {}
}

fn read_request(conn: &mut dyn Conn) {
    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];
    loop {
        match conn.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    return;
                }
            }
        }
    }
}

fn serve(mut conn: Box<dyn Conn>, behavior: Behavior, counters: &ServerCounters) {
    match behavior {
        Behavior::Respond(resp) => {
            read_request(conn.as_mut());
            let _ = conn.write_all(resp);
        }
        Behavior::SplitAtStatus(resp) => {
            read_request(conn.as_mut());
            conn.no_delay();
            let _ = conn.write_all(&resp[..9]);
            let _ = conn.flush();
            thread::sleep(Duration::from_millis(5));
            let _ = conn.write_all(&resp[9..]);
        }
        Behavior::CloseAfterRequest => read_request(conn.as_mut()),
        Behavior::CloseImmediately => {}
    }
    counters.leave();
    conn.close_write();
    drop(conn);
}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    fn accept(&self) -> std::io::Result<Box<dyn Conn>> {
        match self {
            Listener::Tcp(l) => l.accept().map(|(s, _)| Box::new(s) as Box<dyn Conn>),
            Listener::Unix(l) => l.accept().map(|(s, _)| Box::new(s) as Box<dyn Conn>),
        }
    }
}

pub(crate) struct TestServer {
    addr: TargetAddr,
    counters: Arc<ServerCounters>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    unix_path: Option<PathBuf>,
}

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(0);

impl TestServer {
    pub(crate) fn tcp(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind tcp test server");
        let addr = TargetAddr::Inet(listener.local_addr().expect("local addr"));
        Self::start(Listener::Tcp(listener), addr, behavior, None)
    }

    pub(crate) fn unix(behavior: Behavior) -> Self {
        let id = NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("htstress-{}-{}.sock", std::process::id(), id));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind unix test server");
        let addr = TargetAddr::Unix(path.clone());
        Self::start(Listener::Unix(listener), addr, behavior, Some(path))
    }

    fn start(listener: Listener, addr: TargetAddr, behavior: Behavior, unix_path: Option<PathBuf>) -> Self {
        let counters = Arc::new(ServerCounters::default());
        let stop = Arc::new(AtomicBool::new(false));

        let c = Arc::clone(&counters);
        let s = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("test-server".into())
            .spawn(move || loop {
                let conn = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    }
                };
                if s.load(Ordering::SeqCst) {
                    return;
                }
                c.enter();
                let c = Arc::clone(&c);
                thread::spawn(move || serve(conn, behavior, &c));
            })
            .expect("spawn test server");

        Self { addr, counters, stop, handle: Some(handle), unix_path }
    }

    pub(crate) fn addr(&self) -> TargetAddr {
        self.addr.clone()
    }

    pub(crate) fn accepted(&self) -> u64 {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> u64 {
        self.counters.max_active.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // unblock accept()
        match &self.addr {
            TargetAddr::Inet(a) => {
                let _ = TcpStream::connect(a);
            }
            TargetAddr::Unix(p) => {
                let _ = UnixStream::connect(p);
            }
        }
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        if let Some(p) = &self.unix_path {
            let _ = std::fs::remove_file(p);
        }
    }
}
