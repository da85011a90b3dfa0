//! # jsonapi-kit
//!
//! JSON:API resources on top of axum.
//!
//! - **Resources**: implement [`Resource`] and mount it with [`JsonApi::register`]
//! - **Relationships**: linkage endpoints via [`RelationshipResource`]
//! - **Documents**: schemas dump resource objects with links, `included` and sparse fieldsets
//! - **Pagination**: page-number, offset and cursor strategies
//! - **OpenAPI**: every registered route is described by [`JsonApiApp::openapi`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use jsonapi_kit::{async_trait, ApiResult, JsonApi, JsonApiResponse, RequestHooks, Resource,
//!     ResourceOptions, Schema, Field, Scope, SerializeOptions};
//!
//! struct Articles { schema: Arc<Schema> }
//!
//! impl RequestHooks for Articles {}
//!
//! #[async_trait]
//! impl Resource for Articles {
//!     fn options(&self) -> ResourceOptions {
//!         ResourceOptions::new("articles", self.schema.clone())
//!     }
//!
//!     async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
//!         let body = scope.serialize(&json!({"id": id, "title": "x"}), SerializeOptions::single()).await?;
//!         Ok(scope.to_response(body, None))
//!     }
//! }
//! ```

pub use async_trait::async_trait;

mod app;
mod context;
mod dispatch;
pub mod document;
mod error;
pub mod fields;
pub mod openapi;
pub mod pagination;
pub mod query;
mod registry;
mod relationship;
mod request;
mod resource;
mod response;
pub mod routes;
pub mod schema;

pub use app::{JsonApi, JsonApiApp, RegistrationError};
pub use context::RequestContext;
pub use dispatch::HandlerKind;
pub use document::{ErrorDocument, ErrorObject, ErrorSource, JSONAPI_MEDIA_TYPE};
pub use error::{serialize_error, ApiError, ApiResult, JsonApiError};
pub use fields::{Linkage, Relationship};
pub use openapi::{deep_merge, OpenApiInfo};
pub use pagination::{
    CursorPaginator, CursorSource, IdCursor, OffsetPaginator, PageNumberPaginator, PageRequest,
    Pagination, PaginationLinks, Paginator,
};
pub use registry::{RegistryError, ResourceBinding, ResourceRegistry, SchemaRegistry};
pub use relationship::{RelationshipOptions, RelationshipResource, RelationshipScope};
pub use request::JsonApiRequest;
pub use resource::{
    IncludeRelations, Inclusion, RequestHooks, Resource, ResourceOptions, Scope, SerializeOptions,
    DEFAULT_ALLOWED_METHODS,
};
pub use response::JsonApiResponse;
pub use routes::{IdMask, UrlError};
pub use schema::{Field, FieldKind, Schema, SchemaError, SchemaOptions};
