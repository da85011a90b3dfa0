//! Resource handlers and the per-request scope handed to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::app::{AppState, JsonApi, RegistrationError};
use crate::context::RequestContext;
use crate::error::{serialize_error, ApiError, ApiResult, JsonApiError};
use crate::openapi::OpenApiInfo;
use crate::pagination::{PageRequest, Pagination, Paginator};
use crate::query::{parse_included_params, parse_sparse_fields_params, process_sparse_fields, IncludeTree};
use crate::registry::ResourceBinding;
use crate::request::{read_json, require_jsonapi_content_type, JsonApiRequest};
use crate::response::JsonApiResponse;
use crate::routes::{IdMask, UrlError};
use crate::schema::{DumpContext, Schema};

/// Methods accepted unless a handler narrows them down.
pub static DEFAULT_ALLOWED_METHODS: [Method; 4] =
    [Method::GET, Method::PATCH, Method::POST, Method::DELETE];

/// Hooks shared by resources and relationship sub-resources.
#[async_trait]
pub trait RequestHooks: Send + Sync + 'static {
    /// Requests with any other method are answered with 405 before a handler runs.
    fn allowed_methods(&self) -> &[Method] {
        &DEFAULT_ALLOWED_METHODS
    }

    /// Runs before the handler. An error skips the handler and the `after_request` hook.
    async fn before_request(
        &self,
        _request: &JsonApiRequest,
        _context: &mut RequestContext,
    ) -> ApiResult<()> {
        Ok(())
    }

    /// Runs once a response exists, including error responses. An error replaces the response.
    async fn after_request(
        &self,
        _request: &JsonApiRequest,
        _context: &RequestContext,
        _response: &mut JsonApiResponse,
    ) -> ApiResult<()> {
        Ok(())
    }

    /// Turns any error raised while handling the request into a response.
    async fn handle_error(
        &self,
        _request: &JsonApiRequest,
        _context: &RequestContext,
        error: ApiError,
    ) -> JsonApiResponse {
        serialize_error(&error)
    }
}

/// Compound document support of a resource.
pub enum Inclusion<'a> {
    Supported(&'a dyn IncludeRelations),
    Unsupported,
}

#[async_trait]
pub trait IncludeRelations: Send + Sync {
    /// Attach the related objects named by `relations` (`a`, `a.b`) to `obj`
    /// so the schema can dump them into `included`.
    async fn include_relations(&self, obj: &mut Value, relations: &[String]) -> ApiResult<()>;
}

/// Declarative part of a resource.
#[derive(Clone, Default)]
pub struct ResourceOptions {
    pub type_: String,
    pub schema: Option<Arc<Schema>>,
    pub id_mask: IdMask,
    pub pagination: Option<Arc<dyn Paginator>>,
    /// Mount name; defaults to the type. Lets one type be mounted under several prefixes.
    pub register_as: Option<String>,
    pub openapi: OpenApiInfo,
}

impl ResourceOptions {
    pub fn new(type_: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            type_: type_.into(),
            schema: Some(schema),
            ..Default::default()
        }
    }

    pub fn id_mask(mut self, id_mask: IdMask) -> Self {
        self.id_mask = id_mask;
        self
    }

    pub fn pagination(mut self, paginator: impl Paginator + 'static) -> Self {
        self.pagination = Some(Arc::new(paginator));
        self
    }

    pub fn register_as(mut self, name: impl Into<String>) -> Self {
        self.register_as = Some(name.into());
        self
    }

    pub fn openapi(mut self, info: OpenApiInfo) -> Self {
        self.openapi = info;
        self
    }
}

fn not_implemented<T>() -> ApiResult<T> {
    Err(JsonApiError::method_not_allowed().into())
}

/// A JSON:API resource type mounted as a family of routes:
///
/// | route name | path | handler |
/// |---|---|---|
/// | `{name}:get_many` | `GET {base}/{type}/` | [`get_many`](Resource::get_many) |
/// | `{name}:post` | `POST {base}/{type}/` | [`post`](Resource::post) |
/// | `{name}:get` | `GET {base}/{type}/{id}` | [`get`](Resource::get) |
/// | `{name}:patch` | `PATCH {base}/{type}/{id}` | [`patch`](Resource::patch) |
/// | `{name}:delete` | `DELETE {base}/{type}/{id}` | [`delete`](Resource::delete) |
/// | `{name}:{rel}` | `GET {base}/{type}/{id}/{rel}` | [`get_related`](Resource::get_related) |
/// | `{name}:{rel}-id` | `GET {base}/{type}/{id}/{rel}/{related_id}` | [`get_related`](Resource::get_related) |
///
/// Related routes exist for relationships naming a `related_resource`; the `-id` form only
/// for to-many relationships. Handlers that are not overridden answer 405.
#[async_trait]
pub trait Resource: RequestHooks {
    fn options(&self) -> ResourceOptions;

    async fn get(&self, _scope: &Scope<'_>, _id: &str) -> ApiResult<JsonApiResponse> {
        not_implemented()
    }

    async fn patch(&self, _scope: &Scope<'_>, _id: &str) -> ApiResult<JsonApiResponse> {
        not_implemented()
    }

    async fn delete(&self, _scope: &Scope<'_>, _id: &str) -> ApiResult<JsonApiResponse> {
        not_implemented()
    }

    async fn get_many(&self, _scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        not_implemented()
    }

    async fn post(&self, _scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        not_implemented()
    }

    async fn get_related(
        &self,
        _scope: &Scope<'_>,
        _id: &str,
        _relationship: &str,
        _related_id: Option<&str>,
    ) -> ApiResult<JsonApiResponse> {
        not_implemented()
    }

    /// Resources able to attach related objects return `Inclusion::Supported(self)`.
    fn inclusion(&self) -> Inclusion<'_> {
        Inclusion::Unsupported
    }

    fn register_routes(self, app: &mut JsonApi, base_path: &str) -> Result<(), RegistrationError>
    where
        Self: Sized,
    {
        app.register(self, base_path)
    }
}

/// How [`Scope::serialize`] treats its data.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub many: bool,
    pub paginate: bool,
    /// Forwarded to the paginator.
    pub pagination_kwargs: Map<String, Value>,
}

impl SerializeOptions {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn many() -> Self {
        Self {
            many: true,
            ..Self::default()
        }
    }

    /// A collection sliced by the resource's paginator.
    pub fn paginated() -> Self {
        Self {
            many: true,
            paginate: true,
            ..Self::default()
        }
    }

    pub fn with_pagination_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.pagination_kwargs = kwargs;
        self
    }
}

/// Everything a resource handler needs for one request.
pub struct Scope<'a> {
    request: &'a JsonApiRequest,
    context: &'a RequestContext,
    state: &'a AppState,
    binding: &'a ResourceBinding,
    inclusion: Inclusion<'a>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        request: &'a JsonApiRequest,
        context: &'a RequestContext,
        state: &'a AppState,
        binding: &'a ResourceBinding,
        inclusion: Inclusion<'a>,
    ) -> Self {
        Self {
            request,
            context,
            state,
            binding,
            inclusion,
        }
    }

    pub fn request(&self) -> &JsonApiRequest {
        self.request
    }

    pub fn context(&self) -> &RequestContext {
        self.context
    }

    pub fn binding(&self) -> &ResourceBinding {
        self.binding
    }

    pub fn schema(&self) -> &Schema {
        &self.binding.schema
    }

    /// Path of a named route, without the application's url prefix.
    pub fn url_path_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        self.state.url_path_for(name, params)
    }

    /// Check the content type, parse the body and validate it against the schema.
    /// Returns the raw document.
    pub async fn validate_body(&self, partial: bool) -> ApiResult<Value> {
        require_jsonapi_content_type(self.request)?;
        let body = read_json(self.request, "Could not read request body as JSON.")?;
        let errors = self.binding.schema.validate(&body, partial);
        if !errors.is_empty() {
            tracing::debug!(
                errors = ?errors,
                "Could not validate request body according to JSON:API spec"
            );
            return Err(JsonApiError::with_errors(StatusCode::BAD_REQUEST, None, errors).into());
        }
        Ok(body)
    }

    /// Validated body flattened into `{attribute: value, relationship: id(s)}`.
    /// Use `partial` for PATCH requests.
    pub async fn deserialize_body(&self, partial: bool) -> ApiResult<Map<String, Value>> {
        let body = self.validate_body(partial).await?;
        self.binding
            .schema
            .load(&body, partial)
            .map_err(|errors| JsonApiError::with_errors(StatusCode::BAD_REQUEST, None, errors).into())
    }

    /// Serialize `data` as a document of this resource's type.
    ///
    /// Pagination runs first and its links replace the top-level links, then requested
    /// relations are included, then sparse fieldsets are applied.
    pub async fn serialize<T>(&self, data: &T, options: SerializeOptions) -> ApiResult<Value>
    where
        T: Serialize + Sync + ?Sized,
    {
        let mut data = serde_json::to_value(data).map_err(ApiError::internal)?;
        let mut pagination_links = None;
        if options.paginate {
            let Value::Array(items) = data else {
                return Err(ApiError::internal(anyhow::anyhow!(
                    "only collections can be paginated"
                )));
            };
            let page = self.paginate_request(items, &options.pagination_kwargs)?;
            data = Value::Array(page.data);
            pagination_links = Some(page.links);
        }

        let include = self.prepare_included(&mut data, options.many).await?;
        let ctx = DumpContext {
            links: self.state.links(),
            schemas: &self.state.schemas,
            include: &include,
            self_related_route: None,
        };
        let mut body = self
            .binding
            .schema
            .dump(&data, options.many, &ctx)
            .map_err(ApiError::internal)?;
        self.apply_sparse_fields(&mut body)?;

        if let (Some(links), Some(doc)) = (pagination_links, body.as_object_mut()) {
            doc.insert("links".to_string(), links.to_value());
        }
        Ok(body)
    }

    /// Serialize related object(s) in place of the relationship, for `get_related`.
    ///
    /// Uses the related resource's schema; the top-level `self` link points back at the
    /// related route that was requested.
    pub async fn serialize_related<T>(&self, data: &T, many: bool) -> ApiResult<Value>
    where
        T: Serialize + Sync + ?Sized,
    {
        let relationship = self.context.relationship().ok_or_else(|| {
            ApiError::internal(anyhow::anyhow!("request is not bound to a relationship"))
        })?;
        let related_name = self.binding.related_resource(relationship).ok_or_else(|| {
            ApiError::internal(anyhow::anyhow!(
                "relationship `{relationship}` has no related resource"
            ))
        })?;
        let related = self
            .state
            .resources
            .get(related_name)
            .map_err(ApiError::internal)?;

        let mut route = format!("{}:{}", self.binding.name, relationship);
        let mut kwargs = BTreeMap::new();
        kwargs.insert(
            "id".to_string(),
            self.context.id().unwrap_or_default().to_string(),
        );
        if self.context.related_id().is_some() {
            route.push_str("-id");
            kwargs.insert("related_id".to_string(), "<id>".to_string());
        }

        let data = serde_json::to_value(data).map_err(ApiError::internal)?;
        let include = IncludeTree::default();
        let ctx = DumpContext {
            links: self.state.links(),
            schemas: &self.state.schemas,
            include: &include,
            self_related_route: Some((route.as_str(), &kwargs)),
        };
        let mut body = related
            .schema
            .dump(&data, many, &ctx)
            .map_err(ApiError::internal)?;
        self.apply_sparse_fields(&mut body)?;
        Ok(body)
    }

    /// Slice `data` with the resource's paginator.
    pub fn paginate_request(
        &self,
        data: Vec<Value>,
        kwargs: &Map<String, Value>,
    ) -> ApiResult<Pagination> {
        let paginator = self.binding.pagination.as_ref().ok_or_else(|| {
            ApiError::internal(anyhow::anyhow!(
                "Pagination class must be defined to use pagination"
            ))
        })?;
        let page = PageRequest {
            request: self.request,
            url_prefix: &self.state.url_prefix,
            kwargs,
        };
        Ok(paginator.paginate(&page, data)?)
    }

    /// Wrap a document; `meta` replaces any top-level meta already present.
    pub fn to_response(&self, body: Value, meta: Option<Map<String, Value>>) -> JsonApiResponse {
        JsonApiResponse::new(body).with_meta(meta.unwrap_or_default())
    }

    fn apply_sparse_fields(&self, body: &mut Value) -> ApiResult<()> {
        let sparse = parse_sparse_fields_params(self.request)?;
        process_sparse_fields(body, &sparse);
        Ok(())
    }

    async fn prepare_included(&self, data: &mut Value, many: bool) -> ApiResult<IncludeTree> {
        let Some(relations) = parse_included_params(self.request) else {
            return Ok(IncludeTree::default());
        };
        let relations: Vec<String> = relations.into_iter().collect();
        let handler = match &self.inclusion {
            Inclusion::Supported(handler) => *handler,
            Inclusion::Unsupported => {
                return Err(JsonApiError::bad_request(
                    "Inclusion of related resources is not supported.",
                )
                .into())
            }
        };
        match data {
            Value::Array(items) if many => {
                for item in items.iter_mut() {
                    handler.include_relations(item, &relations).await?;
                }
            }
            Value::Null => {}
            item => handler.include_relations(item, &relations).await?,
        }
        Ok(IncludeTree::from_paths(relations.iter().map(String::as_str)))
    }
}
