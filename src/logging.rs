use anyhow::{anyhow, bail, Context, Result};
use std::io;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr so stdout stays clean
/// for the report. `RUST_LOG` directives override `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = create_env_filter(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn create_env_filter(level: &str) -> Result<EnvFilter> {
    let base = parse_level(level)?;
    EnvFilter::builder()
        .with_default_directive(base.into())
        .from_env()
        .context("invalid RUST_LOG directives")
}

fn parse_level(level: &str) -> Result<Level> {
    Ok(match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => bail!("invalid log level: {other}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("warn").unwrap(), Level::WARN);
        assert!(parse_level("loud").is_err());
    }
}
