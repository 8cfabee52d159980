//! Reading produced by the sampler and the JSON shapes exchanged with the
//! collector. Keep the wire structs in step with the collector's ingestion
//! endpoint.

use serde::{Deserialize, Serialize};

pub const UNKNOWN_HOSTNAME: &str = "Unknown";

/// One pass of the sampler. Failed sub-measurements already hold their
/// defaults (0, or `None` for ping).
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub hostname: String,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub disk_percent: f64,
    pub ping_ms: Option<f64>,
}

/// Body of `POST /api/agent/metrics`.
#[derive(Debug, Serialize)]
pub struct SnapshotPayload<'a> {
    pub system_id: &'a str,
    pub hostname: &'a str,
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
    /// `null` when unmeasured.
    pub ping: Option<f64>,
}

impl<'a> SnapshotPayload<'a> {
    pub fn new(system_id: &'a str, reading: &'a Reading) -> Self {
        Self {
            system_id,
            hostname: &reading.hostname,
            cpu: reading.cpu_percent,
            ram: reading.ram_percent,
            disk: reading.disk_percent,
            ping: reading.ping_ms,
        }
    }
}

/// Collector reply on success: `status` is `ok`, or `degraded` when the
/// collector kept the snapshot in memory only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ack {
    pub status: String,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Ack {
    pub fn is_degraded(&self) -> bool {
        self.status == "degraded"
    }
}
