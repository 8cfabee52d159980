//! SysWatch agent library: host identity, sampling, and delivery of readings
//! to a collector.

pub mod config;
pub mod identity;
pub mod ping;
pub mod runner;
pub mod sampler;
pub mod transport;
pub mod types;
