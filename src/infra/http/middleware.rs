use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request identifier, also echoed in the `x-request-id` response header.
#[derive(Debug, Clone)]
pub struct RequestId(pub Uuid);

/// Tag the request with a fresh [`RequestId`] and run the rest of the stack
/// inside a span carrying it.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let id = Uuid::new_v4();
    request.extensions_mut().insert(RequestId(id));

    let span = info_span!(
        "http.request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Log every failed response once: 4xx at `warn`, 5xx at `error`, with the
/// [`ErrorReport`] the handler attached. Successes are logged at `debug`.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let query = request.uri().query().unwrap_or_default().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "quire::http::response",
            status = status.as_u16(),
            elapsed_ms,
            "request served"
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    log_failure(status, &query, elapsed_ms, report.as_ref());
    response
}

fn log_failure(status: StatusCode, query: &str, elapsed_ms: u64, report: Option<&ErrorReport>) {
    let source = report.map(|report| report.source).unwrap_or("router");
    let chain = report
        .map(|report| report.messages.join(": "))
        .unwrap_or_default();

    if status.is_server_error() {
        error!(
            target = "quire::http::response",
            status = status.as_u16(),
            query,
            elapsed_ms,
            source,
            chain = %chain,
            "request failed"
        );
    } else {
        warn!(
            target = "quire::http::response",
            status = status.as_u16(),
            query,
            elapsed_ms,
            source,
            chain = %chain,
            "request rejected"
        );
    }
}
