//! Ingestion endpoint: agents POST their latest readings here.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::types::{AckStatus, IngestAck, IngestPayload};

/// Client-side problems with a posted snapshot. Nothing is stored when one
/// of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid JSON payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing system_id")]
    MissingSystemId,
    #[error("system_id longer than {max} characters")]
    SystemIdTooLong { max: usize },
    #[error("{message}")]
    Body { status: StatusCode, message: String },
    #[error("method {0} not allowed; POST a JSON snapshot")]
    MethodNotAllowed(Method),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Body { status, .. } => *status,
            IngestError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<BytesRejection> for IngestError {
    fn from(rejection: BytesRejection) -> Self {
        IngestError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let body = IngestAck {
            status: AckStatus::Error,
            dashboard_url: None,
            message: Some(self.to_string()),
        };
        (self.status(), Json(body)).into_response()
    }
}

// Raw body: every rejection, oversized or undecodable bodies included,
// answers with an `IngestAck` of status `error`.
pub async fn receive_metrics(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestAck>, IngestError> {
    let body = body.inspect_err(|e| debug!("unreadable snapshot body: {e}"))?;
    let snapshot = IngestPayload::from_slice(&body)
        .and_then(|p| p.into_snapshot(Utc::now()))
        .inspect_err(|e| debug!("rejected snapshot: {e}"))?;

    let system_id = snapshot.system_id.clone();
    let dashboard_url = Some(state.dashboard_url(&system_id));

    // Durable write first, without the map lock; the cache is updated
    // whatever the outcome.
    let persisted = state.persist(snapshot.clone()).await;
    if let Some(systems) = state.store.put(snapshot).await {
        info!(%system_id, systems, "new system reporting");
    }

    let ack = match persisted {
        Ok(()) => {
            debug!(%system_id, "snapshot stored");
            IngestAck {
                status: AckStatus::Ok,
                dashboard_url,
                message: None,
            }
        }
        Err(e) => {
            warn!(%system_id, "snapshot kept in memory only: {e}");
            IngestAck {
                status: AckStatus::Degraded,
                dashboard_url,
                message: Some(format!("not persisted: {e}")),
            }
        }
    };
    Ok(Json(ack))
}

/// Any method other than POST on an ingestion path.
pub async fn reject_method(method: Method) -> IngestError {
    IngestError::MethodNotAllowed(method)
}
