//! Dashboard read endpoints. These always answer 200 with a default so a
//! page can render before the first agent report arrives.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};

use crate::state::AppState;
use crate::types::{HostnameValue, Metric, MetricValue, UNKNOWN_HOSTNAME};

pub const HOSTNAME_FIELD: &str = "hostname";

/// GET /api/metrics/{system_id}/{field}: a metric value, or the hostname
/// when `field` is `hostname`.
pub async fn metric_or_hostname(
    State(state): State<AppState>,
    Path((system_id, field)): Path<(String, String)>,
) -> Response {
    if field == HOSTNAME_FIELD {
        Json(get_hostname(&state, &system_id).await).into_response()
    } else {
        Json(get_metric(&state, &system_id, &field).await).into_response()
    }
}

pub async fn get_metric(state: &AppState, system_id: &str, metric_name: &str) -> MetricValue {
    let Some(metric) = Metric::parse(metric_name) else {
        return MetricValue {
            value: 0.0,
            unmeasured: false,
        };
    };
    match state.resolve(system_id).await {
        Some(snapshot) => match snapshot.metric(metric) {
            Some(value) => MetricValue {
                value,
                unmeasured: false,
            },
            None => MetricValue {
                value: 0.0,
                unmeasured: true,
            },
        },
        None => MetricValue {
            value: 0.0,
            unmeasured: false,
        },
    }
}

pub async fn get_hostname(state: &AppState, system_id: &str) -> HostnameValue {
    let hostname = state
        .resolve(system_id)
        .await
        .map(|s| s.hostname.clone())
        .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string());
    HostnameValue { hostname }
}
