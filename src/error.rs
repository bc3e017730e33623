use thiserror::Error;

/// Failures that escape the component boundaries.
///
/// Per-port connectivity and decode problems never show up here: they are
/// downgraded to "closed" or "no banner" where they happen.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A worker pool cannot run anything with a zero ceiling.
    #[error("worker pool concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),

    /// The pool stopped accepting work while tasks were being submitted.
    #[error("worker pool is closed, cannot submit more work")]
    PoolClosed,

    /// A banner read needs room for at least one byte.
    #[error("banner read size must be at least 1 byte (got {0})")]
    InvalidBannerSize(usize),

    #[error("invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("configuration error: {0}")]
    Config(String),
}
