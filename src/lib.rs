//! Library crate for host-recon exposing reusable modules.
pub mod banner;
pub mod config;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod pool;
pub mod ports;
pub mod probe;
pub mod report;
pub mod scanner;
pub mod types;
