use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{Map, Value};

use crate::document::JSONAPI_MEDIA_TYPE;

/// Response carrying a JSON:API document (or nothing).
///
/// A missing body renders as zero bytes, never as `null`.
#[derive(Debug, Clone)]
pub struct JsonApiResponse {
    status: StatusCode,
    body: Option<Value>,
    headers: HeaderMap,
}

impl JsonApiResponse {
    /// 200 OK with a document.
    pub fn new(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }

    /// 201 Created with a document.
    pub fn created(body: Value) -> Self {
        Self::new(body).with_status(StatusCode::CREATED)
    }

    /// 204 No Content.
    pub fn no_content() -> Self {
        Self::empty(StatusCode::NO_CONTENT)
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set the top-level `meta`, replacing any existing one. Empty maps are ignored.
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        if meta.is_empty() {
            return self;
        }
        if let Some(Value::Object(doc)) = self.body.as_mut() {
            doc.insert("meta".to_string(), Value::Object(meta));
        }
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

impl IntoResponse for JsonApiResponse {
    fn into_response(self) -> Response {
        let bytes = match &self.body {
            Some(body) => match serde_json::to_vec(body) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!(error = %err, "failed to encode response document");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            },
            None => Vec::new(),
        };

        let mut resp = Response::new(Body::from(bytes));
        *resp.status_mut() = self.status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_MEDIA_TYPE),
        );
        resp.headers_mut().extend(self.headers);
        resp
    }
}
