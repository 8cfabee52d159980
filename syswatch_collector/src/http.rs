//! Router and the small non-API pages (liveness, per-host dashboard).

use axum::{
    extract::{Path, State},
    response::Html,
    routing::{get, post, MethodRouter},
    Router,
};

use crate::ingest::{receive_metrics, reject_method};
use crate::query::metric_or_hostname;
use crate::state::AppState;
use crate::types::Metric;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/agent/metrics", ingest_route())
        .route("/api/agent/metrics/", ingest_route())
        .route("/receive", ingest_route())
        .route("/receive/", ingest_route())
        .route("/api/metrics/:system_id/:field", get(metric_or_hostname))
        .route("/api/metrics/:system_id/:field/", get(metric_or_hostname))
        .route("/view/:system_id", get(dashboard_view))
        .route("/view/:system_id/", get(dashboard_view))
        .with_state(state)
}

fn ingest_route() -> MethodRouter<AppState> {
    post(receive_metrics).fallback(reject_method)
}

// Server-rendered and refreshed by the browser every 5s.
async fn dashboard_view(
    State(state): State<AppState>,
    Path(system_id): Path<String>,
) -> Html<String> {
    let snapshot = state.resolve(&system_id).await;
    let id = escape_html(&system_id);

    let (hostname, rows) = match snapshot.as_deref() {
        Some(s) => {
            let mut rows = String::new();
            for (label, metric, unit) in [
                ("CPU", Metric::Cpu, "%"),
                ("RAM", Metric::Ram, "%"),
                ("Disk", Metric::Disk, "%"),
                ("Ping", Metric::Ping, " ms"),
            ] {
                let value = match s.metric(metric) {
                    Some(v) => format!("{v:.1}{unit}"),
                    None => "n/a".to_string(),
                };
                rows.push_str(&format!("<tr><th>{label}</th><td>{value}</td></tr>\n"));
            }
            rows.push_str(&format!(
                "<tr><th>Updated</th><td>{}</td></tr>\n",
                s.received_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            (escape_html(&s.hostname), rows)
        }
        None => ("Waiting for Agent...".to_string(), String::new()),
    };

    Html(format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"5\">\
         <title>SysWatch - {hostname}</title></head>\n<body>\n\
         <h1>{hostname}</h1>\n<p>System ID: <code>{id}</code></p>\n\
         <table>\n{rows}</table>\n</body></html>\n"
    ))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
