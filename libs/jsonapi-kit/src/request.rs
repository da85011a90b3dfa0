use std::collections::HashMap;

use axum::body::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, Uri};
use serde_json::Value;

use crate::document::JSONAPI_MEDIA_TYPE;
use crate::error::JsonApiError;

/// Inbound request as seen by hooks and handlers: method, URI, headers,
/// matched path parameters, decoded query pairs and the raw body.
#[derive(Debug, Clone)]
pub struct JsonApiRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Bytes,
}

impl JsonApiRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            path_params: HashMap::new(),
            query,
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Decoded query pairs in request order, duplicates included.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Value of a query parameter; the last occurrence wins.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// POST and PATCH bodies must declare the JSON:API media type, exactly.
pub(crate) fn require_jsonapi_content_type(request: &JsonApiRequest) -> Result<(), JsonApiError> {
    let writes_body = request.method() == Method::POST || request.method() == Method::PATCH;
    if writes_body && request.content_type() != Some(JSONAPI_MEDIA_TYPE) {
        return Err(JsonApiError::bad_request(format!(
            "Incorrect or missing Content-Type header, expected `{JSONAPI_MEDIA_TYPE}`."
        )));
    }
    Ok(())
}

/// Parse the body as JSON, mapping failures to a 400 with `detail`.
pub(crate) fn read_json(request: &JsonApiRequest, detail: &str) -> Result<Value, JsonApiError> {
    request.json().map_err(|err| {
        tracing::debug!(error = %err, "Could not read request body.");
        JsonApiError::bad_request(detail)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str) -> JsonApiRequest {
        JsonApiRequest::new(method, uri.parse().unwrap())
    }

    #[test]
    fn query_is_decoded_and_last_value_wins() {
        let req = request(Method::GET, "/users/?page%5Bsize%5D=1&include=a&page%5Bsize%5D=5");
        assert_eq!(req.query_param("page[size]"), Some("5"));
        assert_eq!(req.query_param("include"), Some("a"));
        assert_eq!(req.query_pairs().len(), 3);
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn content_type_is_only_checked_for_writes() {
        assert!(require_jsonapi_content_type(&request(Method::GET, "/")).is_ok());
        assert!(require_jsonapi_content_type(&request(Method::DELETE, "/")).is_ok());

        let err = require_jsonapi_content_type(&request(Method::POST, "/")).unwrap_err();
        assert_eq!(
            err.detail(),
            "Incorrect or missing Content-Type header, expected `application/vnd.api+json`."
        );

        let ok = request(Method::PATCH, "/").with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_MEDIA_TYPE),
        );
        assert!(require_jsonapi_content_type(&ok).is_ok());

        let wrong = request(Method::PATCH, "/").with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        assert!(require_jsonapi_content_type(&wrong).is_err());
    }

    #[test]
    fn unreadable_body_uses_given_detail() {
        let req = request(Method::POST, "/").with_body("{not json");
        let err = read_json(&req, "Could not read request body as JSON.").unwrap_err();
        assert_eq!(err.detail(), "Could not read request body as JSON.");
    }
}
