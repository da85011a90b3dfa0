use http::StatusCode;
use jsonapi_kit::{ApiError, ErrorObject, JsonApiError};

use crate::domain::error::DomainError;

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let not_found =
            |detail: &str| -> ApiError { JsonApiError::resource_not_found(Some(detail)).into() };
        match &err {
            DomainError::OrganizationNotFound { .. } => not_found("Organization not found."),
            DomainError::UserNotFound { .. } => not_found("User not found."),
            DomainError::TeamNotFound { .. } => not_found("Team not found."),
            DomainError::EmailAlreadyExists { .. } => {
                JsonApiError::with_errors(StatusCode::CONFLICT, None, vec![attribute_error(&err)])
                    .into()
            }
            DomainError::InvalidEmail { .. }
            | DomainError::Empty { .. }
            | DomainError::TooLong { .. } => {
                JsonApiError::with_errors(StatusCode::BAD_REQUEST, None, vec![attribute_error(&err)])
                    .into()
            }
        }
    }
}

fn attribute_error(err: &DomainError) -> ErrorObject {
    let object = ErrorObject::new(err.to_string());
    match err.field() {
        Some(field) => object.with_pointer(format!("/data/attributes/{field}")),
        None => object,
    }
}
