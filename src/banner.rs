use crate::types::BannerResult;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, Span};

/// Passive banner grab: connect, one read, decode.
#[derive(Clone, Debug)]
pub struct BannerCollector {
    budget: Duration,
    max_bytes: usize,
    span: Span,
}

impl BannerCollector {
    /// `budget` bounds connect and read together. `max_bytes` is raised to
    /// 1: a zero-length read returns at once and would pass for an empty
    /// banner.
    pub fn new(budget: Duration, max_bytes: usize, span: Span) -> Self {
        Self {
            budget,
            max_bytes: max_bytes.max(1),
            span,
        }
    }

    /// Never fails: any connect, read or timeout problem yields the absent
    /// marker. The connection is dropped on every path.
    pub async fn collect(&self, ip: IpAddr, port: u16) -> BannerResult {
        let addr = SocketAddr::new(ip, port);
        let banner = match time::timeout(self.budget, self.read_once(addr)).await {
            Ok(Ok(raw)) => Some(decode_banner(&raw)),
            Ok(Err(e)) => {
                debug!(parent: &self.span, port, error = %e, "banner grab failed");
                None
            }
            Err(_) => {
                debug!(parent: &self.span, port, "no banner before timeout");
                None
            }
        };
        BannerResult { port, banner }
    }

    async fn read_once(&self, addr: SocketAddr) -> io::Result<Vec<u8>> {
        let mut stream = TcpStream::connect(addr).await?;
        let mut buf = vec![0u8; self.max_bytes];
        let n = stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}

/// Lossy UTF-8 decode with surrounding whitespace trimmed.
pub fn decode_banner(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}
