//! HTTP client that pushes one reading to the collector.

use reqwest::{Client, Url};
use std::time::Duration;

use crate::types::{Ack, Reading, SnapshotPayload};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connect, timeout, or I/O failure before a full reply arrived.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("collector answered HTTP {code}: {message}")]
    Status { code: u16, message: String },
    #[error("unreadable collector reply: {0}")]
    Decode(#[source] serde_json::Error),
}

pub struct Transport {
    client: Client,
    url: Url,
}

impl Transport {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("syswatch_agent/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn send(&self, system_id: &str, reading: &Reading) -> Result<Ack, TransportError> {
        let resp = self
            .client
            .post(self.url.clone())
            .json(&SnapshotPayload::new(system_id, reading))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
                message: error_message(&body),
            });
        }
        serde_json::from_slice(&body).map_err(TransportError::Decode)
    }
}

// `message` or `error` from a JSON error body, else the start of the raw text.
fn error_message(body: &[u8]) -> String {
    if let Ok(v) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(m) = v.get(key).and_then(|m| m.as_str()) {
                return m.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "(empty body)".to_string()
    } else {
        text.chars().take(200).collect()
    }
}
