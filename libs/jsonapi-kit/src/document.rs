use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Media type of every JSON:API request and response body.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// JSON:API error object.
///
/// Only `detail` is always present; the remaining members are emitted when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(title = "ErrorObject", description = "JSON:API error object")]
pub struct ErrorObject {
    /// Unique identifier for this particular occurrence of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// HTTP status code applicable to this problem, as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Application-specific error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short, human-readable summary of the problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable explanation specific to this occurrence of the problem.
    pub detail: String,
    /// Reference to the part of the request document that caused the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub meta: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(title = "ErrorSource")]
pub struct ErrorSource {
    /// JSON Pointer to the offending value (e.g. "/data/attributes/name").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    /// Name of the offending query parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

/// Top-level document carrying `errors`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(title = "ErrorDocument")]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorObject {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            id: None,
            status: None,
            code: None,
            title: None,
            detail: detail.into(),
            source: None,
            meta: None,
        }
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        let source = self.source.get_or_insert(ErrorSource {
            pointer: None,
            parameter: None,
        });
        source.pointer = Some(pointer.into());
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        let source = self.source.get_or_insert(ErrorSource {
            pointer: None,
            parameter: None,
        });
        source.parameter = Some(parameter.into());
        self
    }

    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status = Some(status.as_u16().to_string());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn pointer(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.pointer.as_deref())
    }
}
