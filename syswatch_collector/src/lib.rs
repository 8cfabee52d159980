//! SysWatch collector library: latest-snapshot store, durable mirror and the
//! HTTP surface agents and dashboards talk to.

pub mod config;
pub mod db;
pub mod http;
pub mod ingest;
pub mod query;
pub mod state;
pub mod store;
pub mod types;
