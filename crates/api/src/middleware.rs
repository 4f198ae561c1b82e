use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use testimony_infra::references::CORRELATION_ID_HEADER;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::observability;

const REQUEST_ID_HEADER: &str = "x-request-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Correlation id of the inbound request, forwarded on every reference lookup
/// it triggers.
#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

#[derive(Clone)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::now_v7().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, TestimonySpan> {
    TraceLayer::new_for_http().make_span_with(TestimonySpan)
}

/// One span per request. Only the path is recorded, since list queries carry
/// caller-supplied ids.
#[derive(Clone, Default)]
pub struct TestimonySpan;

impl<B> MakeSpan<B> for TestimonySpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };
        info_span!(
            "testimonies_http",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %header(REQUEST_ID_HEADER),
            correlation_id = %header(CORRELATION_ID_HEADER)
        )
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<UuidRequestId> {
    SetRequestIdLayer::x_request_id(UuidRequestId)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

pub fn timeout_layer() -> TimeoutLayer {
    TimeoutLayer::new(REQUEST_TIMEOUT)
}

/// Adopts the caller's `x-correlation-id` (a blank one counts as absent) or
/// mints one, exposes it to handlers as [`CorrelationId`] and echoes it back.
pub async fn correlation_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(CORRELATION_ID_HEADER);
    let supplied = match req.headers().get(&header_name).map(HeaderValue::to_str) {
        Some(Ok(value)) => Some(value.trim().to_string()).filter(|value| !value.is_empty()),
        Some(Err(_)) => {
            return ApiError::Validation("invalid correlation id".into()).into_response();
        }
        None => None,
    };
    let correlation_id = supplied.unwrap_or_else(|| Uuid::now_v7().to_string());
    let Ok(header_value) = HeaderValue::from_str(&correlation_id) else {
        return ApiError::Validation("invalid correlation id".into()).into_response();
    };

    req.headers_mut()
        .insert(header_name.clone(), header_value.clone());
    req.extensions_mut()
        .insert(CorrelationId(correlation_id));

    let mut response = next.run(req).await;
    response.headers_mut().insert(header_name, header_value);
    response
}

pub async fn metrics_layer(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().as_str().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(req).await;
    observability::register_http_request(&method, &route, response.status(), start.elapsed());
    response
}
