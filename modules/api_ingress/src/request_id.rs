//! `x-request-id` handling: generation, propagation and the per-request span.

use axum::http::{HeaderName, Request};
use axum::{body::Body, middleware::Next, response::Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

/// Request id as seen by handlers (`Extension<XRequestId>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XRequestId(pub String);

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn header() -> HeaderName {
    HeaderName::from_static(REQUEST_ID_HEADER)
}

fn header_value<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Generates nanoid request ids for requests that arrive without one.
#[derive(Clone, Default)]
pub struct MakeReqId;

impl MakeRequestId for MakeReqId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        let id = nanoid::nanoid!();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Copies the request id into the extensions and the current span.
pub async fn push_req_id_to_extensions(mut req: Request<Body>, next: Next) -> Response {
    let rid = header_value(&req).unwrap_or("n/a").to_owned();
    tracing::Span::current().record("request_id", tracing::field::display(&rid));
    req.extensions_mut().insert(XRequestId(rid));
    next.run(req).await
}

#[allow(clippy::type_complexity)]
pub fn create_trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    impl Fn(&Request<Body>) -> tracing::Span + Clone,
> {
    TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "http_request",
            method = %req.method(),
            path = %req.uri().path(),
            query = req.uri().query().unwrap_or(""),
            version = ?req.version(),
            request_id = %header_value(req).unwrap_or("n/a"),
            status = Empty,
            latency_ms = Empty
        )
    })
}
