use axum::http::header;
use axum::response::{IntoResponse, Response};

/// `GET /metrics`: a static Prometheus-text placeholder. Real scraping
/// (per-provider counters, latency histograms) is out of scope — the core's
/// job is dispatch, not observability plumbing.
pub async fn metrics() -> Response {
    const BODY: &str = "# HELP bifrost_up Whether the gateway process is running.\n\
# TYPE bifrost_up gauge\n\
bifrost_up 1\n";

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], BODY).into_response()
}
