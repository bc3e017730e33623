use crate::types::{HostReport, NO_BANNER};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

/// Console rendering of a report, one finding per line.
pub fn render_text(report: &HostReport) -> String {
    let host = &report.target.host;
    let mut out = String::new();

    if !report.is_up {
        let _ = writeln!(out, "{host} is down or not reachable.");
        return out;
    }
    let _ = writeln!(out, "{host} is up.");

    if report.open_ports.is_empty() {
        let _ = writeln!(out, "No open ports found.");
        return out;
    }

    let joined = report
        .open_ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "Open ports on {host}: {joined}");

    for port in &report.open_ports {
        let text = report
            .banner(*port)
            .map(|b| b.display_text())
            .unwrap_or(NO_BANNER);
        let _ = writeln!(out, "Port {port} banner: {text}");
    }
    out
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &HostReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report).context("failed to serialize report")?;
    Ok(())
}
