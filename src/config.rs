use crate::error::ScanError;
use crate::ports::PortRange;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for one scan. Defaults reproduce the reference behaviour:
/// 1s liveness, 1s connect, 2s banner budget, 1024-byte banner read,
/// 100 concurrent port probes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    pub liveness_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Covers connect and read of a banner grab.
    pub banner_budget_ms: u64,
    pub banner_max_bytes: usize,
    pub port_concurrency: usize,
    pub banner_concurrency: usize,
    /// Ports the TCP liveness probe knocks on.
    pub liveness_ports: Vec<u16>,
    /// Skip the liveness gate and treat the host as up.
    pub assume_up: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_ms: 1_000,
            connect_timeout_ms: 1_000,
            banner_budget_ms: 2_000,
            banner_max_bytes: 1024,
            port_concurrency: 100,
            banner_concurrency: 100,
            liveness_ports: vec![80, 443, 22, 445, 139],
            assume_up: false,
        }
    }
}

impl ScanConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn banner_budget(&self) -> Duration {
        Duration::from_millis(self.banner_budget_ms)
    }
}

/// Settings file of the surrounding recon tool.
///
/// Only the keys this tool needs are read; credentials and directory-service
/// flags living in the same file are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReconConfig {
    /// Target host (name or IP literal).
    pub server_ip: String,
    /// Whether host reconnaissance is enabled at all.
    #[serde(default)]
    pub host_recon: bool,
    #[serde(default)]
    pub ports: PortRange,
    #[serde(default)]
    pub scan: ScanConfig,
}

impl ReconConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ScanError> {
        serde_yaml::from_str(s).map_err(|e| ScanError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }
}

/// Pick the host to scan.
///
/// An explicit target always wins. Otherwise the configured `server_ip` is
/// used when `host_recon` is enabled, and `Ok(None)` means recon is switched
/// off and nothing should be scanned.
pub fn select_host(
    cli_target: Option<&str>,
    config: Option<&ReconConfig>,
) -> Result<Option<String>, ScanError> {
    match (cli_target, config) {
        (Some(t), _) => Ok(Some(t.to_string())),
        (None, Some(cfg)) if cfg.host_recon => Ok(Some(cfg.server_ip.clone())),
        (None, Some(_)) => Ok(None),
        (None, None) => Err(ScanError::Config(
            "no target: pass --target or a --conf file with server_ip".into(),
        )),
    }
}
