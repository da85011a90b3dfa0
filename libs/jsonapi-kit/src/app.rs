//! Application object: registration of resources, then a frozen axum router.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use http::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::context::RequestContext;
use crate::dispatch::{handle_request, Dispatch, HandlerKind, RelationshipEndpoint, ResourceEndpoint};
use crate::error::JsonApiError;
use crate::openapi::{build_document, relationship_defaults, resource_defaults, OpenApiInfo, OperationSpec};
use crate::registry::{RegistryError, ResourceBinding, ResourceRegistry, SchemaRegistry};
use crate::relationship::RelationshipResource;
use crate::request::JsonApiRequest;
use crate::resource::Resource;
use crate::routes::{IdMask, LinkBuilder, RoutePattern, RouteTable, UrlError};
use crate::schema::{Schema, SchemaError};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Cannot register a resource without specifying its `type_` and its `schema`.")]
    MissingTypeOrSchema,
    #[error("relationship resource does not name its parent resource")]
    MissingParent,
    #[error("Parent resource should be registered first.")]
    ParentNotRegistered,
    #[error("Parent schema does not define `{0}` relationship.")]
    UnknownRelationship(String),
    #[error("resource `{0}` has a `path` id mask and cannot expose relationships")]
    PathMaskedParent(String),
    #[error("route `{name}` is already registered for `{existing}`")]
    DuplicateRoute { name: String, existing: String },
    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Tables shared by every request once the application is frozen.
#[derive(Debug)]
pub(crate) struct AppState {
    pub(crate) url_prefix: String,
    pub(crate) routes: RouteTable,
    pub(crate) schemas: SchemaRegistry,
    pub(crate) resources: ResourceRegistry,
}

impl AppState {
    pub(crate) fn links(&self) -> LinkBuilder<'_> {
        LinkBuilder::new(&self.routes, &self.url_prefix)
    }

    pub(crate) fn url_path_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        self.routes.url_path_for(name, &to_params(params))
    }
}

fn to_params(params: &[(&str, &str)]) -> BTreeMap<String, String> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// One router entry: a path, a method and the handler answering it.
struct RouteEntry {
    handler: HandlerKind,
    endpoint: Arc<dyn Dispatch>,
    relationship: Option<String>,
    /// Router parameter name -> request context name.
    renames: Vec<(String, String)>,
    operation: OperationSpec,
}

/// Related routes wait for [`JsonApi::freeze`]: the related resource may register later.
struct PendingRelated {
    resource: String,
    relationship: String,
    related: String,
    many: bool,
    item_path: String,
    id_mask: IdMask,
    endpoint: Arc<dyn Dispatch>,
    openapi: OpenApiInfo,
}

/// Resources and relationship resources being assembled into an application.
///
/// ```ignore
/// let mut app = JsonApi::new().with_url_prefix("http://localhost:8087");
/// app.register(Users::new(store.clone()), "/api")?;
/// app.register_relationship(TeamUsers::new(store))?;
/// let router = app.into_router()?;
/// ```
#[derive(Default)]
pub struct JsonApi {
    url_prefix: String,
    routes: RouteTable,
    schemas: SchemaRegistry,
    resources: ResourceRegistry,
    entries: Vec<RouteEntry>,
    pending: Vec<PendingRelated>,
}

impl JsonApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme and authority prepended to generated links, e.g. `http://localhost:8087`.
    pub fn with_url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Make a schema available to relationship fields naming it.
    pub fn register_schema(&mut self, schema: Arc<Schema>) -> Result<(), RegistrationError> {
        Ok(self.schemas.register(schema)?)
    }

    /// Mount `resource` under `{base_path}/{type}`.
    pub fn register<R: Resource>(&mut self, resource: R, base_path: &str) -> Result<(), RegistrationError> {
        let options = resource.options();
        let schema = match options.schema {
            Some(schema) if !options.type_.is_empty() => schema,
            _ => return Err(RegistrationError::MissingTypeOrSchema),
        };
        self.schemas.register(schema.clone())?;

        let name = options.register_as.unwrap_or_else(|| options.type_.clone());
        if self.resources.contains(&name) {
            return Err(RegistryError::DuplicateResource(name).into());
        }
        let mount_path = format!("{}/{}", base_path.trim_end_matches('/'), options.type_);
        let item_path = format!("{mount_path}/{}", options.id_mask.segment("id"));
        let collection_path = format!("{mount_path}/");

        let endpoint: Arc<dyn Dispatch> = Arc::new(ResourceEndpoint {
            resource: Arc::new(resource),
            name: name.clone(),
        });
        let masks = HashMap::from([("id".to_string(), options.id_mask)]);
        for (handler, method, path) in [
            (HandlerKind::Get, Method::GET, &item_path),
            (HandlerKind::Patch, Method::PATCH, &item_path),
            (HandlerKind::Delete, Method::DELETE, &item_path),
            (HandlerKind::GetMany, Method::GET, &collection_path),
            (HandlerKind::Post, Method::POST, &collection_path),
        ] {
            let info = options.openapi.operation(handler, resource_defaults(handler, &schema));
            self.add_route(
                format!("{name}:{}", handler.as_str()),
                RoutePattern::parse(path, &masks),
                method,
                &name,
                RouteEntry {
                    handler,
                    endpoint: endpoint.clone(),
                    relationship: None,
                    renames: Vec::new(),
                    operation: OperationSpec {
                        path: String::new(),
                        method: Method::GET,
                        tag: String::new(),
                        params: Vec::new(),
                        info,
                    },
                },
            )?;
        }

        if options.id_mask != IdMask::Path {
            for relationship in schema.relationships() {
                let Some(related) = relationship.related_resource_name() else {
                    continue;
                };
                self.pending.push(PendingRelated {
                    resource: name.clone(),
                    relationship: relationship.name().to_string(),
                    related: related.to_string(),
                    many: relationship.is_many(),
                    item_path: item_path.clone(),
                    id_mask: options.id_mask,
                    endpoint: endpoint.clone(),
                    openapi: options.openapi.clone(),
                });
            }
        }

        tracing::debug!(resource = %name, path = %mount_path, "registered JSON:API resource");
        self.resources.register(ResourceBinding {
            name,
            type_: options.type_,
            schema,
            id_mask: options.id_mask,
            mount_path,
            pagination: options.pagination,
            related: BTreeMap::new(),
        })?;
        Ok(())
    }

    /// Mount `resource` under `{parent item path}/relationships/{relationship}`.
    pub fn register_relationship<R: RelationshipResource>(
        &mut self,
        resource: R,
    ) -> Result<(), RegistrationError> {
        let options = resource.options();
        if options.parent.is_empty() {
            return Err(RegistrationError::MissingParent);
        }
        let parent = self
            .resources
            .get(&options.parent)
            .map_err(|_| RegistrationError::ParentNotRegistered)?;
        if parent.id_mask == IdMask::Path {
            return Err(RegistrationError::PathMaskedParent(parent.name.clone()));
        }
        let relationship = parent
            .schema
            .get_relationship(&options.relationship)
            .ok_or_else(|| RegistrationError::UnknownRelationship(options.relationship.clone()))?;

        // Sibling routes must share the parameter name, so the parent id stays `{id}`
        // in the router and becomes `parent_id` in the request context.
        let path = format!(
            "{}/{}/relationships/{}",
            parent.mount_path,
            parent.id_mask.segment("id"),
            options.relationship
        );
        let name = format!("{}:relationships-{}", parent.name, options.relationship);
        let masks = HashMap::from([("id".to_string(), parent.id_mask)]);
        let tag = parent.name.clone();
        let defaults: Vec<(HandlerKind, Value)> = [
            HandlerKind::Get,
            HandlerKind::Patch,
            HandlerKind::Post,
            HandlerKind::Delete,
        ]
        .into_iter()
        .map(|handler| (handler, relationship_defaults(handler, relationship)))
        .collect();

        let endpoint: Arc<dyn Dispatch> = Arc::new(RelationshipEndpoint {
            resource: Arc::new(resource),
            parent: options.parent.clone(),
            relationship: options.relationship.clone(),
        });
        for (handler, defaults) in defaults {
            let method = handler_method(handler);
            self.add_route(
                name.clone(),
                RoutePattern::parse(&path, &masks),
                method,
                &tag,
                RouteEntry {
                    handler,
                    endpoint: endpoint.clone(),
                    relationship: Some(options.relationship.clone()),
                    renames: vec![("id".to_string(), "parent_id".to_string())],
                    operation: OperationSpec {
                        path: String::new(),
                        method: Method::GET,
                        tag: String::new(),
                        params: Vec::new(),
                        info: options.openapi.operation(handler, defaults),
                    },
                },
            )?;
        }
        tracing::debug!(route = %name, path = %path, "registered JSON:API relationship");
        Ok(())
    }

    /// Path of a named route registered so far.
    pub fn url_path_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        self.routes.url_path_for(name, &to_params(params))
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Resolve related routes and build the router. Registration is over after this.
    pub fn freeze(mut self) -> Result<JsonApiApp, RegistrationError> {
        for pending in std::mem::take(&mut self.pending) {
            self.add_related_routes(pending)?;
        }

        let state = Arc::new(AppState {
            url_prefix: self.url_prefix,
            routes: self.routes,
            schemas: self.schemas,
            resources: self.resources,
        });

        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut operations = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let method = entry.operation.method.clone();
            let filter = MethodFilter::try_from(method.clone())
                .map_err(|_| RegistrationError::UnsupportedMethod(method))?;
            let route = Arc::new(BoundRoute {
                state: state.clone(),
                handler: entry.handler,
                endpoint: entry.endpoint,
                relationship: entry.relationship,
                params: entry
                    .operation
                    .params
                    .iter()
                    .map(|(param, mask)| {
                        let context_name = entry
                            .renames
                            .iter()
                            .find(|(from, _)| from == param)
                            .map_or_else(|| param.clone(), |(_, to)| to.clone());
                        (param.clone(), context_name, *mask)
                    })
                    .collect(),
            });

            let mut paths = vec![entry.operation.path.clone()];
            if entry.handler == HandlerKind::GetMany || entry.handler == HandlerKind::Post {
                let bare = entry.operation.path.trim_end_matches('/');
                if !bare.is_empty() {
                    paths.push(bare.to_string());
                }
            }
            for path in paths {
                let route = route.clone();
                let router = by_path.remove(&path).unwrap_or_else(method_router);
                by_path.insert(
                    path,
                    router.on(filter, move |request: Request| {
                        let route = route.clone();
                        async move { serve_route(route, request).await }
                    }),
                );
            }
            operations.push(entry.operation);
        }

        let router = by_path
            .into_iter()
            .fold(Router::new(), |router, (path, methods)| router.route(&path, methods))
            .fallback(|| async { JsonApiError::not_found() })
            // Body size limits are applied by the hosting middleware.
            .layer(DefaultBodyLimit::disable());

        Ok(JsonApiApp {
            state,
            operations,
            router,
        })
    }

    /// Shorthand for `freeze()?.into_router()`.
    pub fn into_router(self) -> Result<Router, RegistrationError> {
        Ok(self.freeze()?.into_router())
    }

    fn add_related_routes(&mut self, pending: PendingRelated) -> Result<(), RegistrationError> {
        let related = self.resources.get(&pending.related)?;
        let related_mask = related.id_mask;
        let related_schema = related.schema.clone();
        let related_name = related.name.clone();

        let base = format!("{}/{}", pending.item_path, pending.relationship);
        let masks = HashMap::from([
            ("id".to_string(), pending.id_mask),
            ("related_id".to_string(), related_mask),
        ]);
        let info = pending
            .openapi
            .operation(HandlerKind::GetRelated, resource_defaults(HandlerKind::GetRelated, &related_schema));

        let mut routes = vec![(format!("{}:{}", pending.resource, pending.relationship), base.clone())];
        if pending.many {
            routes.push((
                format!("{}:{}-id", pending.resource, pending.relationship),
                format!("{base}/{}", related_mask.segment("related_id")),
            ));
        }
        for (name, path) in routes {
            self.add_route(
                name,
                RoutePattern::parse(&path, &masks),
                Method::GET,
                &pending.resource,
                RouteEntry {
                    handler: HandlerKind::GetRelated,
                    endpoint: pending.endpoint.clone(),
                    relationship: Some(pending.relationship.clone()),
                    renames: Vec::new(),
                    operation: OperationSpec {
                        path: String::new(),
                        method: Method::GET,
                        tag: String::new(),
                        params: Vec::new(),
                        info: info.clone(),
                    },
                },
            )?;
        }

        self.resources
            .get_mut(&pending.resource)?
            .related
            .insert(pending.relationship, related_name);
        Ok(())
    }

    /// Record the route name and its router entry. A name may be reused only for the
    /// same template (one relationship route answers several methods).
    fn add_route(
        &mut self,
        name: String,
        pattern: RoutePattern,
        method: Method,
        tag: &str,
        mut entry: RouteEntry,
    ) -> Result<(), RegistrationError> {
        if !self.routes.register(name.clone(), pattern.clone()) {
            let existing = self
                .routes
                .get(&name)
                .map(|p| p.template().to_string())
                .unwrap_or_default();
            if existing != pattern.template() {
                return Err(RegistrationError::DuplicateRoute { name, existing });
            }
        }
        entry.operation.path = pattern.template().to_string();
        entry.operation.method = method;
        entry.operation.tag = tag.to_string();
        entry.operation.params = pattern
            .params()
            .map(|(param, mask)| (param.to_string(), mask))
            .collect();
        self.entries.push(entry);
        Ok(())
    }
}

fn handler_method(handler: HandlerKind) -> Method {
    match handler {
        HandlerKind::Get | HandlerKind::GetMany | HandlerKind::GetRelated => Method::GET,
        HandlerKind::Patch => Method::PATCH,
        HandlerKind::Post => Method::POST,
        HandlerKind::Delete => Method::DELETE,
    }
}

fn method_router() -> MethodRouter {
    MethodRouter::new().fallback(|| async { JsonApiError::method_not_allowed() })
}

/// What a matched route needs at request time.
struct BoundRoute {
    state: Arc<AppState>,
    handler: HandlerKind,
    endpoint: Arc<dyn Dispatch>,
    relationship: Option<String>,
    /// (router name, context name, mask)
    params: Vec<(String, String, IdMask)>,
}

async fn serve_route(route: Arc<BoundRoute>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let mut path_params = HashMap::new();
    if let Ok(raw) = RawPathParams::from_request_parts(&mut parts, &()).await {
        for (name, value) in &raw {
            path_params.insert(name.to_string(), value.to_string());
        }
    }

    let mut context = RequestContext::new().with_relationship(route.relationship.clone());
    for (param, context_name, mask) in &route.params {
        match path_params.get(param) {
            Some(value) if mask.matches(value) => context.set_param(context_name, value.clone()),
            _ => return JsonApiError::not_found().into_response(),
        }
    }

    let (method, uri, headers) = (parts.method.clone(), parts.uri.clone(), parts.headers.clone());
    let body = match Bytes::from_request(Request::from_parts(parts, body), &()).await {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::debug!(error = %rejection.body_text(), "request body over the size limit");
            return JsonApiError::new(StatusCode::PAYLOAD_TOO_LARGE).into_response();
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "failed to read request body");
            return JsonApiError::bad_request("Could not read request body.").into_response();
        }
    };
    let request = JsonApiRequest::new(method, uri)
        .with_headers(headers)
        .with_path_params(path_params)
        .with_body(body);

    handle_request(
        route.endpoint.as_ref(),
        &route.state,
        route.handler,
        &request,
        context,
    )
    .await
    .into_response()
}

/// A frozen application: the router plus what is needed to describe it.
pub struct JsonApiApp {
    state: Arc<AppState>,
    operations: Vec<OperationSpec>,
    router: Router,
}

impl JsonApiApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn url_path_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        self.state.url_path_for(name, params)
    }

    pub fn resource(&self, name: &str) -> Result<&ResourceBinding, RegistryError> {
        self.state.resources.get(name)
    }

    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    /// OpenAPI 3 document of every registered operation.
    pub fn openapi(&self, title: &str, version: &str) -> Value {
        let mut schemas: BTreeMap<&str, &Schema> = BTreeMap::new();
        for name in self.state.resources.names() {
            if let Ok(binding) = self.state.resources.get(name) {
                schemas.insert(binding.schema.name(), binding.schema.as_ref());
            }
        }
        build_document(title, version, &self.operations, schemas.into_values())
    }
}
