use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::document::ErrorObject;
use crate::response::JsonApiResponse;

/// Detail used for every unexpected failure; never leaks the underlying cause.
pub const INTERNAL_ERROR_DETAIL: &str = "Internal server error";

/// HTTP error with a JSON:API representation.
///
/// The error list always ends with `{detail}`: supplied errors come first, then the
/// detail (which defaults to the reason phrase of `status`) is appended.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct JsonApiError {
    status: StatusCode,
    detail: String,
    errors: Vec<ErrorObject>,
}

impl JsonApiError {
    pub fn new(status: StatusCode) -> Self {
        Self::with_errors(status, None, Vec::new())
    }

    pub fn with_detail(status: StatusCode, detail: impl Into<String>) -> Self {
        Self::with_errors(status, Some(detail.into()), Vec::new())
    }

    pub fn with_errors(
        status: StatusCode,
        detail: Option<String>,
        mut errors: Vec<ErrorObject>,
    ) -> Self {
        let detail = detail.unwrap_or_else(|| reason_phrase(status));
        errors.push(ErrorObject::new(detail.clone()));
        Self {
            status,
            detail,
            errors,
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::with_detail(StatusCode::BAD_REQUEST, detail)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// 404 raised by handlers when the requested object does not exist.
    /// Never carries custom errors.
    pub fn resource_not_found(detail: Option<&str>) -> Self {
        Self::with_detail(
            StatusCode::NOT_FOUND,
            detail.unwrap_or("Resource object not found."),
        )
    }

    /// Invalid pagination query parameters.
    pub fn pagination(detail: impl Into<String>) -> Self {
        Self::bad_request(detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn errors(&self) -> &[ErrorObject] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ErrorObject> {
        self.errors
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown Error")
        .to_string()
}

/// Any failure produced while handling a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    JsonApi(#[from] JsonApiError),
    /// Plain HTTP error; rendered as a single `{detail}`.
    #[error("{detail}")]
    Http { status: StatusCode, detail: String },
    /// Unexpected failure; rendered as a generic 500 and logged.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn http(status: StatusCode, detail: impl Into<String>) -> Self {
        Self::Http {
            status,
            detail: detail.into(),
        }
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::JsonApi(e) => e.status(),
            Self::Http { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Render an error as a JSON:API error document.
///
/// Only unexpected errors are logged as failures; the rest are client mistakes.
pub fn serialize_error(error: &ApiError) -> JsonApiResponse {
    let (status, errors) = match error {
        ApiError::JsonApi(e) => (e.status(), e.errors().to_vec()),
        ApiError::Http { status, detail } => (*status, vec![ErrorObject::new(detail.clone())]),
        ApiError::Internal(err) => {
            tracing::error!(error = ?err, "Encountered an error while handling request.");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![ErrorObject::new(INTERNAL_ERROR_DETAIL)],
            )
        }
    };
    if status.is_client_error() {
        tracing::debug!(status = status.as_u16(), error = %error, "request rejected");
    }
    JsonApiResponse::new(json!({ "errors": errors })).with_status(status)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        serialize_error(&self).into_response()
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_defaults_to_reason_phrase() {
        let err = JsonApiError::method_not_allowed();
        assert_eq!(err.detail(), "Method Not Allowed");
        assert_eq!(err.errors(), &[ErrorObject::new("Method Not Allowed")]);
    }

    #[test]
    fn detail_is_appended_after_supplied_errors() {
        let first = JsonApiError::bad_request("foo");
        let second = JsonApiError::bad_request("bar");
        let mut errors = first.into_errors();
        errors.extend(second.into_errors());

        let combined = JsonApiError::with_errors(
            StatusCode::BAD_REQUEST,
            Some("final".to_string()),
            errors,
        );
        let details: Vec<_> = combined.errors().iter().map(|e| e.detail.as_str()).collect();
        assert_eq!(details, vec!["foo", "bar", "final"]);
    }

    #[test]
    fn resource_not_found_uses_default_detail() {
        let err = JsonApiError::resource_not_found(None);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.detail(), "Resource object not found.");

        let custom = JsonApiError::resource_not_found(Some("User not found."));
        assert_eq!(custom.detail(), "User not found.");
    }

    #[test]
    fn serialize_error_maps_each_variant() {
        let jsonapi = serialize_error(&JsonApiError::bad_request("nope").into());
        assert_eq!(jsonapi.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            jsonapi.body(),
            Some(&json!({"errors": [{"detail": "nope"}]}))
        );

        let http = serialize_error(&ApiError::http(StatusCode::CONFLICT, "taken"));
        assert_eq!(http.status(), StatusCode::CONFLICT);
        assert_eq!(http.body(), Some(&json!({"errors": [{"detail": "taken"}]})));

        let internal = serialize_error(&ApiError::internal(anyhow::anyhow!("db exploded")));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            internal.body(),
            Some(&json!({"errors": [{"detail": "Internal server error"}]}))
        );
    }
}
