#![warn(clippy::all)]

//! Plotwatch core: supervises the Signum miner process and distills its
//! log output into operational metrics.
//!
//! The supervisor owns the child process and its combined output stream;
//! the telemetry pipeline pumps every captured line through the pure
//! classifier into the metrics collector. Consumers poll
//! [`MinerSupervisor::snapshot`] at whatever cadence suits them.

pub mod classifier;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod supervisor;

pub use classifier::*;
pub use config::*;
pub use metrics::*;
pub use pipeline::*;
pub use supervisor::*;
