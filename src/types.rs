use crate::ports::PortRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder rendered when no banner could be obtained.
pub const NO_BANNER: &str = "No banner";

/// One host to scan plus the port range to sweep on it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Hostname or IP literal.
    pub host: String,
    pub ports: PortRange,
}

impl Target {
    /// Target sweeping the default range `1-1024`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: PortRange::default(),
        }
    }

    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = ports;
        self
    }
}

/// Outcome of a single connect attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub open: bool,
}

/// Outcome of a banner grab.
///
/// `banner: None` means nothing could be read; `Some("")` means the service
/// accepted the connection and closed it (or sent only whitespace).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BannerResult {
    pub port: u16,
    pub banner: Option<String>,
}

impl BannerResult {
    pub fn absent(port: u16) -> Self {
        Self { port, banner: None }
    }

    /// Banner text, or the "No banner" placeholder for the absent marker.
    pub fn display_text(&self) -> &str {
        self.banner.as_deref().unwrap_or(NO_BANNER)
    }
}

/// Final report for one scanned host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub target: Target,
    pub is_up: bool,
    /// Ascending, no duplicates.
    pub open_ports: Vec<u16>,
    /// Exactly one entry per open port.
    pub banners: BTreeMap<u16, BannerResult>,
    pub scanned_at: String,
    pub elapsed_ms: u64,
}

impl HostReport {
    /// Report for a host that failed the liveness check.
    pub fn down(target: Target, scanned_at: String, elapsed_ms: u64) -> Self {
        Self {
            target,
            is_up: false,
            open_ports: Vec::new(),
            banners: BTreeMap::new(),
            scanned_at,
            elapsed_ms,
        }
    }

    pub fn banner(&self, port: u16) -> Option<&BannerResult> {
        self.banners.get(&port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_banner_renders_placeholder() {
        assert_eq!(BannerResult::absent(80).display_text(), "No banner");
        let empty = BannerResult { port: 80, banner: Some(String::new()) };
        assert_eq!(empty.display_text(), "");
    }

    #[test]
    fn down_report_is_empty() {
        let r = HostReport::down(Target::new("10.0.0.1"), "t".into(), 3);
        assert!(!r.is_up);
        assert!(r.open_ports.is_empty());
        assert!(r.banners.is_empty());
        assert_eq!(r.target.ports, PortRange::default());
    }
}
