//! Latency probe: one `ping` to a fixed host, bounded by its own timeout.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_PING_PROGRAM: &str = "ping";
pub const DEFAULT_PING_HOST: &str = "8.8.8.8";
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error("could not run ping: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("ping to {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },
    #[error("no reply from {0}")]
    NoReply(String),
    #[error("no latency found in ping output")]
    Unparsed,
}

#[derive(Debug, Clone)]
pub struct PingProbe {
    /// Executable invoked with the platform's one-echo arguments.
    pub program: OsString,
    pub host: String,
    pub timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        Self {
            program: DEFAULT_PING_PROGRAM.into(),
            host: DEFAULT_PING_HOST.to_string(),
            timeout: DEFAULT_PING_TIMEOUT,
        }
    }
}

impl PingProbe {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: DEFAULT_PING_PROGRAM.into(),
            host: host.into(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Round-trip time in milliseconds.
    pub async fn probe(&self) -> Result<f64, PingError> {
        let mut cmd = Command::new(&self.program);
        if cfg!(windows) {
            cmd.args(["-n", "1", "-w"])
                .arg(self.timeout.as_millis().to_string());
        } else {
            cmd.args(["-c", "1"]);
        }
        cmd.arg(&self.host)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let out = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| PingError::Timeout {
                host: self.host.clone(),
                timeout: self.timeout,
            })?
            .map_err(PingError::Spawn)?;
        if !out.status.success() {
            return Err(PingError::NoReply(self.host.clone()));
        }
        parse_ping_output(&String::from_utf8_lossy(&out.stdout)).ok_or(PingError::Unparsed)
    }
}

/// Pull the first `time=12.3` / `time<1ms` value out of ping output
/// (Linux, macOS and Windows formats).
pub fn parse_ping_output(output: &str) -> Option<f64> {
    output.lines().find_map(|line| {
        let idx = line.find("time=").or_else(|| line.find("time<"))?;
        let rest = &line[idx + 5..];
        let num: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        num.parse::<f64>().ok()
    })
}
