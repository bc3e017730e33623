use std::path::PathBuf;

use host_recon::config::{select_host, ReconConfig, ScanConfig};
use host_recon::ports::PortRange;
use host_recon::scanner::Scanner;
use host_recon::types::Target;
use host_recon::{logging, report};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// host-recon — liveness check, TCP connect sweep and banner grab for a single host.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "host-recon",
    version,
    about = "Liveness check, TCP connect sweep and banner grab for a single host.",
    long_about = None
)]
struct Cli {
    /// YAML configuration file (`server_ip`, `host_recon`, optional `ports` and `scan`).
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Host to scan. Overrides `server_ip` and runs even if `host_recon` is disabled.
    #[arg(long)]
    target: Option<String>,

    /// Port range to sweep, e.g. `1-1024` or `22`.
    #[arg(long)]
    ports: Option<PortRange>,

    /// Max concurrent TCP connect attempts.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Port-probe connect timeout in milliseconds.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Treat the host as up without a liveness check.
    #[arg(long = "skip-liveness", default_value_t = false)]
    skip_liveness: bool,

    /// Write the report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level)?;

    let file_config = match cli.conf.as_deref() {
        Some(path) => Some(
            ReconConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
        ),
        None => None,
    };

    let Some(host) = select_host(cli.target.as_deref(), file_config.as_ref())? else {
        info!("host recon is disabled in the configuration, nothing to do");
        return Ok(());
    };

    let mut config = file_config
        .as_ref()
        .map(|c| c.scan.clone())
        .unwrap_or_else(ScanConfig::default);
    if let Some(n) = cli.concurrency {
        config.port_concurrency = n;
    }
    if let Some(ms) = cli.timeout_ms {
        config.connect_timeout_ms = ms;
    }
    if cli.skip_liveness {
        config.assume_up = true;
    }

    let ports = cli
        .ports
        .or_else(|| file_config.as_ref().map(|c| c.ports))
        .unwrap_or_default();
    let target = Target::new(host).with_ports(ports);

    println!("host-recon configuration:");
    println!("  target       : {}", target.host);
    println!("  ports        : {}", target.ports);
    println!("  concurrency  : {}", config.port_concurrency);
    println!("  timeout_ms   : {}", config.connect_timeout_ms);
    println!("  liveness     : {}", if config.assume_up { "skipped" } else { "tcp" });
    println!(
        "  output       : {}",
        cli.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    let scanner = Scanner::new(config).context("failed to set up scanner")?;

    // Ctrl-C cancels the scan; whatever was not probed yet counts as closed.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing with partial results");
            cancel_ctrlc.cancel();
        }
    });

    println!("\nPerforming host reconnaissance on {}...", target.host);
    let result = scanner
        .scan_with_cancel(&target, cancel)
        .await
        .context("scan failed")?;
    print!("{}", report::render_text(&result));

    if let Some(path) = cli.output.as_deref() {
        match report::write_report_json(path, &result) {
            Ok(()) => println!("Wrote JSON report to {}", path.display()),
            Err(e) => eprintln!("Failed to write JSON to {}: {e:#}", path.display()),
        }
    }

    Ok(())
}
