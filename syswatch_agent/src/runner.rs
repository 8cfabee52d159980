//! The agent loop: sample, send, sleep, repeat. Iterations never overlap and
//! no failure leaves the loop.

use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::sampler::Sampler;
use crate::transport::{Transport, TransportError};
use crate::types::{Ack, Reading};

pub struct Runner {
    system_id: String,
    sampler: Sampler,
    transport: Transport,
    last_dashboard: Option<String>,
}

impl Runner {
    pub fn new(system_id: String, sampler: Sampler, transport: Transport) -> Self {
        Self {
            system_id,
            sampler,
            transport,
            last_dashboard: None,
        }
    }

    pub async fn run(&mut self, cfg: &AgentConfig) {
        loop {
            self.tick().await;
            if cfg.once {
                return;
            }
            tokio::time::sleep(cfg.interval).await;
        }
    }

    /// One sample + send; every outcome ends up in the log.
    async fn tick(&mut self) {
        let reading = self.sampler.collect().await;
        let outcome = self.transport.send(&self.system_id, &reading).await;
        self.report(&reading, &outcome);
    }

    fn report(&mut self, reading: &Reading, outcome: &Result<Ack, TransportError>) {
        let short_id: String = self.system_id.chars().take(8).collect();
        match outcome {
            Ok(ack) if ack.is_degraded() => warn!(
                "metrics for {} ({short_id}...) accepted but not persisted: {}",
                reading.hostname,
                ack.message.as_deref().unwrap_or("no detail")
            ),
            Ok(_) => info!(
                "metrics sent for {} ({short_id}...): cpu {:.1}% ram {:.1}% disk {:.1}% ping {}",
                reading.hostname,
                reading.cpu_percent,
                reading.ram_percent,
                reading.disk_percent,
                reading
                    .ping_ms
                    .map(|ms| format!("{ms:.1} ms"))
                    .unwrap_or_else(|| "n/a".into()),
            ),
            Err(TransportError::Status { code, message }) => {
                warn!("collector rejected metrics (HTTP {code}): {message}")
            }
            Err(TransportError::Request(e)) => {
                warn!("could not reach {}: {e}; retrying next tick", self.transport.url())
            }
            Err(TransportError::Decode(e)) => warn!("collector reply unreadable: {e}"),
        }

        if let Ok(Ack {
            dashboard_url: Some(url),
            ..
        }) = outcome
        {
            if self.last_dashboard.as_deref() != Some(url.as_str()) {
                info!("view live dashboard: {url}");
                self.last_dashboard = Some(url.clone());
            }
        }
    }
}
