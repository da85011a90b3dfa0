//! Request lifecycle shared by resources and relationship resources.

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::AppState;
use crate::context::RequestContext;
use crate::error::{ApiError, ApiResult, JsonApiError};
use crate::relationship::{RelationshipResource, RelationshipScope};
use crate::request::JsonApiRequest;
use crate::resource::{RequestHooks, Resource, Scope};
use crate::response::JsonApiResponse;

/// Handler a route is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandlerKind {
    Get,
    Patch,
    Delete,
    GetMany,
    Post,
    GetRelated,
}

impl HandlerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::Get => "get",
            HandlerKind::Patch => "patch",
            HandlerKind::Delete => "delete",
            HandlerKind::GetMany => "get_many",
            HandlerKind::Post => "post",
            HandlerKind::GetRelated => "get_related",
        }
    }
}

#[async_trait]
pub(crate) trait Dispatch: Send + Sync {
    fn hooks(&self) -> &dyn RequestHooks;

    async fn dispatch(
        &self,
        state: &AppState,
        handler: HandlerKind,
        request: &JsonApiRequest,
        context: &RequestContext,
    ) -> ApiResult<JsonApiResponse>;
}

pub(crate) struct ResourceEndpoint<R> {
    pub(crate) resource: Arc<R>,
    pub(crate) name: String,
}

#[async_trait]
impl<R: Resource> Dispatch for ResourceEndpoint<R> {
    fn hooks(&self) -> &dyn RequestHooks {
        self.resource.as_ref()
    }

    async fn dispatch(
        &self,
        state: &AppState,
        handler: HandlerKind,
        request: &JsonApiRequest,
        context: &RequestContext,
    ) -> ApiResult<JsonApiResponse> {
        let binding = state.resources.get(&self.name).map_err(ApiError::internal)?;
        let scope = Scope::new(request, context, state, binding, self.resource.inclusion());
        let id = context.id().unwrap_or_default();
        let resource = self.resource.as_ref();
        match handler {
            HandlerKind::Get => resource.get(&scope, id).await,
            HandlerKind::Patch => resource.patch(&scope, id).await,
            HandlerKind::Delete => resource.delete(&scope, id).await,
            HandlerKind::GetMany => resource.get_many(&scope).await,
            HandlerKind::Post => resource.post(&scope).await,
            HandlerKind::GetRelated => {
                let relationship = context.relationship().unwrap_or_default();
                resource
                    .get_related(&scope, id, relationship, context.related_id())
                    .await
            }
        }
    }
}

pub(crate) struct RelationshipEndpoint<R> {
    pub(crate) resource: Arc<R>,
    pub(crate) parent: String,
    pub(crate) relationship: String,
}

#[async_trait]
impl<R: RelationshipResource> Dispatch for RelationshipEndpoint<R> {
    fn hooks(&self) -> &dyn RequestHooks {
        self.resource.as_ref()
    }

    async fn dispatch(
        &self,
        state: &AppState,
        handler: HandlerKind,
        request: &JsonApiRequest,
        context: &RequestContext,
    ) -> ApiResult<JsonApiResponse> {
        let parent = state.resources.get(&self.parent).map_err(ApiError::internal)?;
        let relationship = parent
            .schema()
            .get_relationship(&self.relationship)
            .ok_or_else(|| {
                ApiError::internal(anyhow::anyhow!(
                    "schema `{}` lost relationship `{}`",
                    parent.schema().name(),
                    self.relationship
                ))
            })?;
        let scope = RelationshipScope::new(request, context, state, parent, relationship);
        let parent_id = context.parent_id().unwrap_or_default();
        let resource = self.resource.as_ref();
        match handler {
            HandlerKind::Get => resource.get(&scope, parent_id).await,
            HandlerKind::Patch => resource.patch(&scope, parent_id).await,
            HandlerKind::Post => resource.post(&scope, parent_id).await,
            HandlerKind::Delete => resource.delete(&scope, parent_id).await,
            HandlerKind::GetMany | HandlerKind::GetRelated => {
                Err(JsonApiError::method_not_allowed().into())
            }
        }
    }
}

/// Run one request through the hooks and the handler.
///
/// `after_request` sees error responses too; only a failing `before_request` skips it.
pub(crate) async fn handle_request(
    endpoint: &dyn Dispatch,
    state: &AppState,
    handler: HandlerKind,
    request: &JsonApiRequest,
    mut context: RequestContext,
) -> JsonApiResponse {
    let hooks = endpoint.hooks();
    if let Err(err) = hooks.before_request(request, &mut context).await {
        return hooks.handle_error(request, &context, err).await;
    }

    let mut response = if !hooks.allowed_methods().contains(request.method()) {
        hooks
            .handle_error(request, &context, JsonApiError::method_not_allowed().into())
            .await
    } else {
        match endpoint.dispatch(state, handler, request, &context).await {
            Ok(response) => response,
            Err(err) => hooks.handle_error(request, &context, err).await,
        }
    };

    if let Err(err) = hooks.after_request(request, &context, &mut response).await {
        response = hooks.handle_error(request, &context, err).await;
    }
    response
}
