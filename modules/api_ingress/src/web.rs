use std::sync::Arc;

use axum::{
    http::header,
    response::{IntoResponse, Json, Response},
};
use jsonapi_kit::{JsonApiError, JSONAPI_MEDIA_TYPE};
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Serves a document built once at startup; clients must not cache it across restarts.
pub async fn serve_openapi(doc: Arc<Value>) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json((*doc).clone()),
    )
        .into_response()
}

/// Re-renders error responses produced by host middleware (body limit, timeout)
/// as JSON:API error documents. Responses already in the JSON:API media type pass through.
pub async fn jsonapi_error_bodies(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_jsonapi = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(JSONAPI_MEDIA_TYPE.as_bytes()));
    if is_jsonapi {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let (rendered, body) = JsonApiError::new(status).into_response().into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    for (name, value) in &rendered.headers {
        parts.headers.insert(name.clone(), value.clone());
    }
    Response::from_parts(parts, body)
}
