//! Relationship sub-resources: `{parent}/{parent_id}/relationships/{name}`.

use async_trait::async_trait;
use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::{AppState, JsonApi, RegistrationError};
use crate::context::RequestContext;
use crate::document::ErrorObject;
use crate::error::{ApiError, ApiResult, JsonApiError};
use crate::fields::{Linkage, Relationship};
use crate::openapi::OpenApiInfo;
use crate::registry::ResourceBinding;
use crate::request::{read_json, require_jsonapi_content_type, JsonApiRequest};
use crate::resource::RequestHooks;
use crate::response::JsonApiResponse;
use crate::routes::UrlError;

#[derive(Debug, Clone, Default)]
pub struct RelationshipOptions {
    /// Mount name of the parent resource, which must be registered first.
    pub parent: String,
    pub relationship: String,
    pub openapi: OpenApiInfo,
}

impl RelationshipOptions {
    pub fn new(parent: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            relationship: relationship.into(),
            openapi: OpenApiInfo::default(),
        }
    }

    pub fn openapi(mut self, info: OpenApiInfo) -> Self {
        self.openapi = info;
        self
    }
}

/// Linkage endpoint of one relationship of a registered resource.
///
/// Handlers receive the parent id; those not overridden answer 405.
#[async_trait]
pub trait RelationshipResource: RequestHooks {
    fn options(&self) -> RelationshipOptions;

    async fn get(&self, _scope: &RelationshipScope<'_>, _parent_id: &str) -> ApiResult<JsonApiResponse> {
        Err(JsonApiError::method_not_allowed().into())
    }

    async fn patch(&self, _scope: &RelationshipScope<'_>, _parent_id: &str) -> ApiResult<JsonApiResponse> {
        Err(JsonApiError::method_not_allowed().into())
    }

    async fn post(&self, _scope: &RelationshipScope<'_>, _parent_id: &str) -> ApiResult<JsonApiResponse> {
        Err(JsonApiError::method_not_allowed().into())
    }

    async fn delete(&self, _scope: &RelationshipScope<'_>, _parent_id: &str) -> ApiResult<JsonApiResponse> {
        Err(JsonApiError::method_not_allowed().into())
    }

    fn register_routes(self, app: &mut JsonApi) -> Result<(), RegistrationError>
    where
        Self: Sized,
    {
        app.register_relationship(self)
    }
}

pub struct RelationshipScope<'a> {
    request: &'a JsonApiRequest,
    context: &'a RequestContext,
    state: &'a AppState,
    parent: &'a ResourceBinding,
    relationship: &'a Relationship,
}

impl<'a> RelationshipScope<'a> {
    pub(crate) fn new(
        request: &'a JsonApiRequest,
        context: &'a RequestContext,
        state: &'a AppState,
        parent: &'a ResourceBinding,
        relationship: &'a Relationship,
    ) -> Self {
        Self {
            request,
            context,
            state,
            parent,
            relationship,
        }
    }

    pub fn request(&self) -> &JsonApiRequest {
        self.request
    }

    pub fn context(&self) -> &RequestContext {
        self.context
    }

    pub fn parent(&self) -> &ResourceBinding {
        self.parent
    }

    pub fn relationship(&self) -> &Relationship {
        self.relationship
    }

    pub fn url_path_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        self.state.url_path_for(name, params)
    }

    /// Read the linkage carried by the request body.
    pub async fn deserialize_ids(&self) -> ApiResult<Linkage> {
        require_jsonapi_content_type(self.request)?;
        let body = read_json(self.request, "Could not read request body.")?;
        let messages = match self.relationship.deserialize(&body) {
            Ok(linkage) => return Ok(linkage),
            Err(messages) => messages,
        };
        tracing::debug!(
            relationship = self.relationship.name(),
            errors = ?messages,
            "Could not deserialize relationship linkage"
        );
        let errors = messages
            .into_iter()
            .map(|detail| ErrorObject::new(detail).with_pointer("/data"))
            .collect();
        Err(JsonApiError::with_errors(StatusCode::BAD_REQUEST, None, errors).into())
    }

    /// Linkage document of `data`, the parent object or anything exposing the relationship.
    pub async fn serialize<T>(&self, data: &T) -> ApiResult<Value>
    where
        T: Serialize + Sync + ?Sized,
    {
        let obj = serde_json::to_value(data).map_err(ApiError::internal)?;
        Ok(self.relationship.serialize_linkage(&obj, &self.state.links()))
    }

    pub fn to_response(&self, body: Value, meta: Option<Map<String, Value>>) -> JsonApiResponse {
        JsonApiResponse::new(body).with_meta(meta.unwrap_or_default())
    }
}
