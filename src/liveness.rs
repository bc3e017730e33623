use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::{self, error::Elapsed};
use tracing::{debug, Span};

/// Reachability gate run before any port work.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// True only if the host answered within the probe's budget. Must not fail.
    async fn is_alive(&self, ip: IpAddr) -> bool;
}

/// Portable liveness check that needs no raw-socket privileges.
///
/// Knocks on a few well-known ports at once. A completed handshake or a
/// refusal both prove the host is there; timeouts, unreachable routes and
/// permission errors do not. A firewall or middlebox that answers SYNs with
/// resets on the host's behalf therefore makes any address look up.
#[derive(Clone, Debug)]
pub struct TcpLiveness {
    ports: Vec<u16>,
    timeout: Duration,
    span: Span,
}

impl TcpLiveness {
    pub fn new(ports: Vec<u16>, timeout: Duration, span: Span) -> Self {
        Self {
            ports,
            timeout,
            span,
        }
    }
}

#[async_trait]
impl LivenessProbe for TcpLiveness {
    async fn is_alive(&self, ip: IpAddr) -> bool {
        let knocks: Vec<_> = self
            .ports
            .iter()
            .map(|&port| knock(SocketAddr::new(ip, port)))
            .collect();

        match first_reply(knocks, self.timeout).await {
            Ok(Some(port)) => {
                debug!(parent: &self.span, %ip, port, "host answered");
                true
            }
            Ok(None) => {
                debug!(parent: &self.span, %ip, "no liveness reply");
                false
            }
            Err(_) => {
                debug!(parent: &self.span, %ip, "liveness probe timed out");
                false
            }
        }
    }
}

/// Run all knocks at once; the first `Some` wins. Knocks still in flight are
/// aborted when the set is dropped.
async fn first_reply<F>(knocks: Vec<F>, budget: Duration) -> Result<Option<u16>, Elapsed>
where
    F: Future<Output = Option<u16>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for k in knocks {
        set.spawn(k);
    }
    time::timeout(budget, async {
        while let Some(joined) = set.join_next().await {
            if let Ok(Some(port)) = joined {
                return Some(port);
            }
        }
        None
    })
    .await
}

/// `Some(port)` if the host replied on `addr`.
async fn knock(addr: SocketAddr) -> Option<u16> {
    match TcpStream::connect(addr).await {
        Ok(_) => Some(addr.port()),
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => Some(addr.port()),
        Err(_) => None,
    }
}

/// Skips the gate: every host counts as up.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssumeUp;

#[async_trait]
impl LivenessProbe for AssumeUp {
    async fn is_alive(&self, _ip: IpAddr) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;
    use std::net::Ipv4Addr;
    use std::pin::Pin;
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn listener_makes_host_alive() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpLiveness::new(vec![port], Duration::from_millis(500), Span::none());
        assert!(probe.is_alive(LOCALHOST).await);
    }

    #[tokio::test]
    async fn refusal_counts_as_reply() {
        let port = {
            let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TcpLiveness::new(vec![port], Duration::from_millis(500), Span::none());
        assert!(probe.is_alive(LOCALHOST).await);
    }

    #[tokio::test]
    async fn silent_knocks_time_out_within_budget() {
        let knocks = vec![future::pending::<Option<u16>>(), future::pending()];
        let start = Instant::now();
        let res = first_reply(knocks, Duration::from_millis(100)).await;
        assert!(res.is_err());
        assert!(start.elapsed() < Duration::from_millis(100 + 250));
    }

    #[tokio::test]
    async fn first_answer_wins_over_silent_knocks() {
        let knocks: Vec<Pin<Box<dyn Future<Output = Option<u16>> + Send>>> = vec![
            Box::pin(future::pending()),
            Box::pin(async { None }),
            Box::pin(async { Some(443) }),
        ];
        assert_eq!(first_reply(knocks, Duration::from_millis(500)).await.unwrap(), Some(443));
    }

    #[tokio::test]
    async fn all_failed_knocks_mean_no_reply() {
        let knocks = vec![future::ready(None::<u16>), future::ready(None)];
        assert_eq!(first_reply(knocks, Duration::from_millis(500)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn no_ports_means_down() {
        let probe = TcpLiveness::new(Vec::new(), Duration::from_millis(100), Span::none());
        assert!(!probe.is_alive(LOCALHOST).await);
    }

    #[tokio::test]
    async fn assume_up_is_always_alive() {
        assert!(AssumeUp.is_alive(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))).await);
    }
}
