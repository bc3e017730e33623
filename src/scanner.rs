use crate::banner::BannerCollector;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::liveness::{AssumeUp, LivenessProbe, TcpLiveness};
use crate::pool::WorkerPool;
use crate::probe::PortProber;
use crate::types::{BannerResult, HostReport, PortResult, Target};
use ::time::{format_description::well_known, OffsetDateTime};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use tokio::net::lookup_host;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Span};

/// Runs a full recon pass against one target: liveness gate, bounded TCP
/// connect sweep over the port range, then a banner grab per open port.
///
/// A `Scanner` keeps no per-scan state and can be reused; every call to
/// [`Scanner::scan`] builds a fresh [`HostReport`] and hands it over.
pub struct Scanner {
    config: ScanConfig,
    liveness: Box<dyn LivenessProbe>,
    port_pool: WorkerPool,
    banner_pool: WorkerPool,
    prober: PortProber,
    collector: BannerCollector,
    span: Span,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        Self::with_span(config, tracing::info_span!("recon"))
    }

    /// Build a scanner whose components all log under `span`.
    pub fn with_span(config: ScanConfig, span: Span) -> Result<Self, ScanError> {
        if config.banner_max_bytes == 0 {
            return Err(ScanError::InvalidBannerSize(0));
        }
        let liveness: Box<dyn LivenessProbe> = if config.assume_up {
            Box::new(AssumeUp)
        } else {
            Box::new(TcpLiveness::new(
                config.liveness_ports.clone(),
                config.liveness_timeout(),
                span.clone(),
            ))
        };
        let port_pool = WorkerPool::with_span(config.port_concurrency, span.clone())?;
        let banner_pool = WorkerPool::with_span(config.banner_concurrency, span.clone())?;
        let prober = PortProber::new(config.connect_timeout(), span.clone());
        let collector =
            BannerCollector::new(config.banner_budget(), config.banner_max_bytes, span.clone());

        Ok(Self {
            config,
            liveness,
            port_pool,
            banner_pool,
            prober,
            collector,
            span,
        })
    }

    /// Replace the liveness gate.
    pub fn with_liveness(mut self, liveness: impl LivenessProbe + 'static) -> Self {
        self.liveness = Box::new(liveness);
        self
    }

    /// Use caller-owned pools, e.g. to share them across scanners.
    pub fn with_pools(mut self, port_pool: WorkerPool, banner_pool: WorkerPool) -> Self {
        self.port_pool = port_pool;
        self.banner_pool = banner_pool;
        self
    }

    pub async fn scan(&self, target: &Target) -> Result<HostReport, ScanError> {
        self.scan_with_cancel(target, CancellationToken::new()).await
    }

    /// Variant that accepts a `CancellationToken`. Ports not probed before
    /// cancellation count as closed, banners not collected as absent.
    ///
    /// Only a pool that refuses work fails the whole scan.
    pub async fn scan_with_cancel(
        &self,
        target: &Target,
        cancel: CancellationToken,
    ) -> Result<HostReport, ScanError> {
        let started = Instant::now();
        let scanned_at = now_rfc3339();
        info!(
            parent: &self.span,
            host = %target.host,
            ports = %target.ports,
            concurrency = self.port_pool.ceiling(),
            "starting host recon"
        );

        let ip = match self.resolve(&target.host).await {
            Some(ip) => ip,
            None => {
                info!(parent: &self.span, host = %target.host, "could not resolve host");
                return Ok(HostReport::down(target.clone(), scanned_at, elapsed_ms(started)));
            }
        };

        if !self.liveness.is_alive(ip).await {
            info!(parent: &self.span, host = %target.host, "host is down or not reachable");
            return Ok(HostReport::down(target.clone(), scanned_at, elapsed_ms(started)));
        }
        info!(parent: &self.span, host = %target.host, %ip, "host is up");

        let ports: Vec<u16> = target.ports.iter().collect();
        let prober = self.prober.clone();
        let swept = self
            .port_pool
            .run(ports.clone(), &cancel, move |port| {
                let prober = prober.clone();
                async move { prober.probe(ip, port).await }
            })
            .await?;

        let open_ports = self.open_ports_from_slots(&ports, swept, &cancel);
        info!(
            parent: &self.span,
            host = %target.host,
            open = open_ports.len(),
            scanned = ports.len(),
            "port sweep finished"
        );

        let collector = self.collector.clone();
        let grabbed = self
            .banner_pool
            .run(open_ports.clone(), &cancel, move |port| {
                let collector = collector.clone();
                async move { collector.collect(ip, port).await }
            })
            .await?;

        let banners = self.banners_from_slots(&open_ports, grabbed, &cancel);

        let report = HostReport {
            target: target.clone(),
            is_up: true,
            open_ports,
            banners,
            scanned_at,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            parent: &self.span,
            host = %target.host,
            elapsed_ms = report.elapsed_ms,
            "host recon finished"
        );
        Ok(report)
    }

    /// IP literals parse directly; names are looked up once, IPv4 preferred.
    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
        match time::timeout(self.config.liveness_timeout(), lookup_host((host, 0))).await {
            Ok(Ok(addrs)) => {
                let addrs: Vec<SocketAddr> = addrs.collect();
                addrs
                    .iter()
                    .find(|a| a.is_ipv4())
                    .or_else(|| addrs.first())
                    .map(SocketAddr::ip)
            }
            Ok(Err(e)) => {
                debug!(parent: &self.span, host, error = %e, "name lookup failed");
                None
            }
            Err(_) => {
                debug!(parent: &self.span, host, "name lookup timed out");
                None
            }
        }
    }

    /// Open ports in sweep order. `ports` is ascending, so the result is too.
    /// An empty slot counts as closed.
    fn open_ports_from_slots(
        &self,
        ports: &[u16],
        swept: Vec<Option<PortResult>>,
        cancel: &CancellationToken,
    ) -> Vec<u16> {
        ports
            .iter()
            .zip(swept)
            .filter_map(|(&port, slot)| match slot {
                Some(res) => res.open.then_some(res.port),
                None => {
                    self.lost_slot(cancel, port, "port probe");
                    None
                }
            })
            .collect()
    }

    /// One entry per open port; an empty slot becomes the absent marker.
    fn banners_from_slots(
        &self,
        open_ports: &[u16],
        grabbed: Vec<Option<BannerResult>>,
        cancel: &CancellationToken,
    ) -> BTreeMap<u16, BannerResult> {
        open_ports
            .iter()
            .zip(grabbed)
            .map(|(&port, slot)| {
                let result = slot.unwrap_or_else(|| {
                    self.lost_slot(cancel, port, "banner grab");
                    BannerResult::absent(port)
                });
                (port, result)
            })
            .collect()
    }

    fn lost_slot(&self, cancel: &CancellationToken, port: u16, what: &str) {
        if cancel.is_cancelled() {
            debug!(parent: &self.span, port, what, "skipped after cancellation");
        } else {
            warn!(parent: &self.span, port, what, "task produced no result, treating as failed");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
