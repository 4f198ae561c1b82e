use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS_TOTAL: &str = "testimonies_api_http_requests_total";
const HTTP_REQUEST_DURATION_SECONDS: &str = "testimonies_api_http_request_duration_seconds";
const TESTIMONIES_CREATED_TOTAL: &str = "testimonies_api_testimonies_created_total";
const TESTIMONY_REJECTIONS_TOTAL: &str = "testimonies_api_testimony_rejections_total";
const LIST_PAGE_ITEMS: &str = "testimonies_api_list_page_items";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Names the result of a request the way the testimony routes produce them,
/// so dashboards can split bad input from missing references and outages.
pub fn request_outcome(status: StatusCode) -> &'static str {
    match status {
        status if status.is_success() => "ok",
        StatusCode::BAD_REQUEST => "invalid_input",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::REQUEST_TIMEOUT => "timeout",
        StatusCode::PAYLOAD_TOO_LARGE => "too_large",
        StatusCode::BAD_GATEWAY => "upstream_unavailable",
        status if status.is_client_error() => "rejected",
        _ => "error",
    }
}

pub fn register_http_request(method: &str, route: &str, status: StatusCode, elapsed: Duration) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "outcome" => request_outcome(status)
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn register_testimony_created() {
    counter!(TESTIMONIES_CREATED_TOTAL).increment(1);
}

pub fn register_testimony_rejected(reason: &'static str) {
    counter!(TESTIMONY_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

pub fn register_list_page(items: usize) {
    histogram!(LIST_PAGE_ITEMS).record(items as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_follow_the_testimony_error_mapping() {
        for (status, outcome) in [
            (StatusCode::OK, "ok"),
            (StatusCode::CREATED, "ok"),
            (StatusCode::BAD_REQUEST, "invalid_input"),
            (StatusCode::NOT_FOUND, "not_found"),
            (StatusCode::REQUEST_TIMEOUT, "timeout"),
            (StatusCode::PAYLOAD_TOO_LARGE, "too_large"),
            (StatusCode::METHOD_NOT_ALLOWED, "rejected"),
            (StatusCode::BAD_GATEWAY, "upstream_unavailable"),
            (StatusCode::INTERNAL_SERVER_ERROR, "error"),
        ] {
            assert_eq!(request_outcome(status), outcome, "{status}");
        }
    }
}
