//! Host sampler: CPU/RAM/disk via sysinfo, latency via the ping probe.
//! A failed sub-measurement is reported and replaced by its default; it
//! never aborts the reading.

use std::time::Duration;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

use crate::ping::{PingError, PingProbe};
use crate::types::{Reading, UNKNOWN_HOSTNAME};

// CPU usage needs two refreshes at least this far apart.
const MIN_CPU_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("{0} usage unavailable on this host")]
    Unavailable(&'static str),
    #[error("hostname lookup failed: {0}")]
    Hostname(#[source] std::io::Error),
    #[error("latency probe failed: {0}")]
    Ping(#[from] PingError),
}

/// Raw outcome of each sub-measurement before defaults are applied.
#[derive(Debug)]
pub struct Parts {
    pub hostname: Result<String, SampleError>,
    pub cpu: Result<f64, SampleError>,
    pub ram: Result<f64, SampleError>,
    pub disk: Result<f64, SampleError>,
    pub ping: Result<f64, SampleError>,
}

impl Parts {
    /// Substitute defaults for failures and hand the failures back.
    pub fn assemble(self) -> (Reading, Vec<SampleError>) {
        let mut failures = Vec::new();
        let mut take = |r: Result<f64, SampleError>| match r {
            Ok(v) => Some(v),
            Err(e) => {
                failures.push(e);
                None
            }
        };
        let cpu = take(self.cpu).unwrap_or(0.0);
        let ram = take(self.ram).unwrap_or(0.0);
        let disk = take(self.disk).unwrap_or(0.0);
        let ping_ms = take(self.ping);
        let hostname = match self.hostname {
            Ok(h) => h,
            Err(e) => {
                failures.push(e);
                UNKNOWN_HOSTNAME.to_string()
            }
        };
        (
            Reading {
                hostname,
                cpu_percent: cpu,
                ram_percent: ram,
                disk_percent: disk,
                ping_ms,
            },
            failures,
        )
    }
}

pub struct Sampler {
    sys: System,
    disks: Disks,
    ping: PingProbe,
    cpu_window: Duration,
}

impl Sampler {
    pub fn new(ping: PingProbe) -> Self {
        let refresh = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
            .with_memory(MemoryRefreshKind::nothing().with_ram());
        Self {
            sys: System::new_with_specifics(refresh),
            disks: Disks::new_with_refreshed_list(),
            ping,
            cpu_window: sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(MIN_CPU_WINDOW),
        }
    }

    /// Take one reading. The CPU window and the ping run concurrently, so a
    /// pass costs roughly max(cpu window, ping timeout).
    pub async fn collect(&mut self) -> Reading {
        let (cpu, ping) = tokio::join!(
            cpu_usage(&mut self.sys, self.cpu_window),
            self.ping.probe()
        );
        let parts = Parts {
            hostname: hostname(),
            cpu,
            ram: ram_usage(&mut self.sys),
            disk: disk_usage(&mut self.disks),
            ping: ping.map_err(SampleError::from),
        };
        let (reading, failures) = parts.assemble();
        for e in &failures {
            warn!("{e}; using default");
        }
        reading
    }
}

async fn cpu_usage(sys: &mut System, window: Duration) -> Result<f64, SampleError> {
    sys.refresh_cpu_usage();
    tokio::time::sleep(window).await;
    sys.refresh_cpu_usage();
    if sys.cpus().is_empty() {
        return Err(SampleError::Unavailable("cpu"));
    }
    Ok(round1(f64::from(sys.global_cpu_usage())))
}

fn ram_usage(sys: &mut System) -> Result<f64, SampleError> {
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return Err(SampleError::Unavailable("memory"));
    }
    let used = total.saturating_sub(sys.available_memory());
    Ok(round1(used as f64 * 100.0 / total as f64))
}

// Filesystem mounted at "/", else the largest disk.
fn disk_usage(disks: &mut Disks) -> Result<f64, SampleError> {
    disks.refresh(true);
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()))
        .ok_or(SampleError::Unavailable("disk"))?;
    let total = root.total_space();
    if total == 0 {
        return Err(SampleError::Unavailable("disk"));
    }
    let used = total.saturating_sub(root.available_space());
    Ok(round1(used as f64 * 100.0 / total as f64))
}

fn hostname() -> Result<String, SampleError> {
    let h = hostname::get().map_err(SampleError::Hostname)?;
    let h = h.to_string_lossy().trim().to_string();
    if h.is_empty() {
        Ok(UNKNOWN_HOSTNAME.to_string())
    } else {
        Ok(h)
    }
}

fn round1(v: f64) -> f64 {
    if v.is_finite() {
        ((v * 10.0).round() / 10.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}
