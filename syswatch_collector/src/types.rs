//! Snapshot model and the JSON shapes exchanged with agents and dashboards.
//! Keep the wire structs stable: agents in the field depend on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::IngestError;

pub const UNKNOWN_HOSTNAME: &str = "Unknown";
pub const MAX_SYSTEM_ID_LEN: usize = 64;
pub const MAX_HOSTNAME_LEN: usize = 128;

/// Latest readings for one host, as held by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub system_id: String,
    pub hostname: String,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub disk_percent: f64,
    /// `None` when the agent could not measure latency.
    pub ping_ms: Option<f64>,
    pub received_at: DateTime<Utc>,
}

/// Metrics a dashboard can ask for by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Ram,
    Disk,
    Ping,
}

impl Metric {
    pub fn parse(name: &str) -> Option<Metric> {
        match name {
            "cpu" => Some(Metric::Cpu),
            "ram" => Some(Metric::Ram),
            "disk" => Some(Metric::Disk),
            "ping" => Some(Metric::Ping),
            _ => None,
        }
    }
}

impl Snapshot {
    /// Value of `metric`, or `None` for an unmeasured ping.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Cpu => Some(self.cpu_percent),
            Metric::Ram => Some(self.ram_percent),
            Metric::Disk => Some(self.disk_percent),
            Metric::Ping => self.ping_ms,
        }
    }
}

// ---------- Agent -> collector ----------

/// Body posted by an agent. Every field is optional on the wire so that
/// validation can tell "missing" apart from "wrong type".
#[derive(Debug, Default, Deserialize)]
pub struct IngestPayload {
    pub system_id: Option<String>,
    pub hostname: Option<String>,
    pub cpu: Option<f64>,
    pub ram: Option<f64>,
    pub disk: Option<f64>,
    pub ping: Option<f64>,
}

impl IngestPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Validate and fill defaults. `received_at` is stamped by the collector.
    pub fn into_snapshot(self, received_at: DateTime<Utc>) -> Result<Snapshot, IngestError> {
        let system_id = self
            .system_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(IngestError::MissingSystemId)?
            .to_string();
        if system_id.chars().count() > MAX_SYSTEM_ID_LEN {
            return Err(IngestError::SystemIdTooLong {
                max: MAX_SYSTEM_ID_LEN,
            });
        }

        let hostname = self
            .hostname
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| h.chars().take(MAX_HOSTNAME_LEN).collect())
            .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string());

        Ok(Snapshot {
            system_id,
            hostname,
            cpu_percent: percent(self.cpu),
            ram_percent: percent(self.ram),
            disk_percent: percent(self.disk),
            // older agents report 0 when the probe failed
            ping_ms: self.ping.filter(|ms| *ms > 0.0),
            received_at,
        })
    }
}

fn percent(v: Option<f64>) -> f64 {
    v.unwrap_or(0.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    /// Accepted into memory but not persisted.
    Degraded,
    Error,
}

/// Single response shape for the ingestion endpoint, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestAck {
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------- Dashboard queries ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unmeasured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameValue {
    pub hostname: String,
}
