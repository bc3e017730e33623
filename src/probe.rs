use crate::types::PortResult;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, trace, warn, Span};

/// Single-shot TCP connect check for one `host:port`.
#[derive(Clone, Debug)]
pub struct PortProber {
    connect_timeout: Duration,
    span: Span,
}

impl PortProber {
    pub fn new(connect_timeout: Duration, span: Span) -> Self {
        Self {
            connect_timeout,
            span,
        }
    }

    /// Open iff the connect completes within the timeout. No retries, and the
    /// socket is dropped right away without reading.
    pub async fn probe(&self, ip: IpAddr, port: u16) -> PortResult {
        let addr = SocketAddr::new(ip, port);
        let open = match time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                debug!(parent: &self.span, port, "port open");
                true
            }
            Ok(Err(e)) => {
                log_connect_error(&self.span, port, &e);
                false
            }
            Err(_) => {
                trace!(parent: &self.span, port, "connect timed out");
                false
            }
        };
        PortResult { port, open }
    }
}

fn log_connect_error(span: &Span, port: u16, e: &io::Error) {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => trace!(parent: span, port, "connection refused"),
        // Socket creation failures (fd exhaustion and the like) are local, not the target's doing.
        io::ErrorKind::OutOfMemory | io::ErrorKind::PermissionDenied => {
            warn!(parent: span, port, error = %e, "local socket error")
        }
        _ if is_fd_exhaustion(e) => {
            warn!(parent: span, port, error = %e, "too many open files")
        }
        _ => debug!(parent: span, port, error = %e, "connect failed"),
    }
}

/// `EMFILE`, the per-process descriptor limit.
#[cfg(unix)]
const EMFILE: i32 = 24;

#[cfg(unix)]
fn is_fd_exhaustion(e: &io::Error) -> bool {
    e.raw_os_error() == Some(EMFILE)
}

#[cfg(not(unix))]
fn is_fd_exhaustion(_e: &io::Error) -> bool {
    false
}
