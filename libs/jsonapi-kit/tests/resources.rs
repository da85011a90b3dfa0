use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use jsonapi_kit::{
    async_trait, ApiResult, Field, IdMask, IncludeRelations, Inclusion, JsonApi, JsonApiError,
    JsonApiRequest, JsonApiResponse, PageNumberPaginator, RegistrationError, Relationship,
    RelationshipOptions, RelationshipResource, RelationshipScope, RequestContext, RequestHooks,
    Resource, ResourceOptions, Schema, Scope, SerializeOptions, JSONAPI_MEDIA_TYPE,
};

struct TestResource {
    schema: Arc<Schema>,
    items: Mutex<Vec<Value>>,
    page_size: Option<usize>,
}

impl TestResource {
    fn new(items: Vec<Value>) -> Self {
        let schema = Schema::new("test-resource")
            .field(Field::string("name").required())
            .build()
            .unwrap();
        Self {
            schema: Arc::new(schema),
            items: Mutex::new(items),
            page_size: None,
        }
    }

    fn paginated(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

impl RequestHooks for TestResource {}

#[async_trait]
impl Resource for TestResource {
    fn options(&self) -> ResourceOptions {
        let options = ResourceOptions::new("test-resource", self.schema.clone());
        match self.page_size {
            Some(size) => options.pagination(PageNumberPaginator::default().with_page_size(size)),
            None => options,
        }
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let item = self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|item| item["id"] == id)
            .cloned()
            .ok_or_else(|| JsonApiError::resource_not_found(None))?;
        let body = scope.serialize(&item, SerializeOptions::single()).await?;
        Ok(scope.to_response(body, None))
    }

    async fn get_many(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let items = self.items.lock().unwrap().clone();
        let options = if self.page_size.is_some() {
            SerializeOptions::paginated()
        } else {
            SerializeOptions::many()
        };
        let body = scope.serialize(&items, options).await?;
        Ok(scope.to_response(body, None))
    }

    async fn post(&self, scope: &Scope<'_>) -> ApiResult<JsonApiResponse> {
        let mut attributes = scope.deserialize_body(false).await?;
        attributes.insert("id".into(), json!("new"));
        let item = Value::Object(attributes);
        self.items.lock().unwrap().push(item.clone());
        let body = scope.serialize(&item, SerializeOptions::single()).await?;
        Ok(JsonApiResponse::created(body))
    }

    async fn delete(&self, _scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        self.items.lock().unwrap().retain(|item| item["id"] != id);
        Ok(JsonApiResponse::no_content())
    }
}

fn people_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new("people")
            .field(Field::string("name"))
            .self_route("people:get", &[("id", "<id>")])
            .build()
            .unwrap(),
    )
}

fn article_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new("articles")
            .field(Field::string("title"))
            .relationship(
                Relationship::new("author", "people")
                    .schema("people")
                    .id_attribute("author_id")
                    .include_resource_linkage(true)
                    .related_resource("people"),
            )
            .relationship(
                Relationship::new("reviewers", "people")
                    .many(true)
                    .schema("people")
                    .related_resource("people"),
            )
            .build()
            .unwrap(),
    )
}

fn people() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Ada"}),
        json!({"id": 2, "name": "Grace"}),
    ]
}

struct People {
    schema: Arc<Schema>,
}

impl RequestHooks for People {}

#[async_trait]
impl Resource for People {
    fn options(&self) -> ResourceOptions {
        ResourceOptions::new("people", self.schema.clone()).id_mask(IdMask::Int)
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        let person = people()
            .into_iter()
            .find(|p| p["id"].to_string() == id)
            .ok_or_else(|| JsonApiError::resource_not_found(None))?;
        let body = scope.serialize(&person, SerializeOptions::single()).await?;
        Ok(scope.to_response(body, None))
    }
}

struct Articles {
    schema: Arc<Schema>,
}

impl Articles {
    fn article() -> Value {
        json!({"id": "1", "title": "Notes", "author_id": 2, "reviewers": [1, 2]})
    }
}

impl RequestHooks for Articles {}

#[async_trait]
impl IncludeRelations for Articles {
    async fn include_relations(&self, obj: &mut Value, relations: &[String]) -> ApiResult<()> {
        if relations.iter().any(|r| r == "author") {
            let author = people()
                .into_iter()
                .find(|p| p["id"] == obj["author_id"])
                .unwrap_or(Value::Null);
            obj["author"] = author;
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for Articles {
    fn options(&self) -> ResourceOptions {
        ResourceOptions::new("articles", self.schema.clone())
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        if id != "1" {
            return Err(JsonApiError::resource_not_found(None).into());
        }
        let body = scope
            .serialize(&Self::article(), SerializeOptions::single())
            .await?;
        Ok(scope.to_response(body, None))
    }

    async fn get_related(
        &self,
        scope: &Scope<'_>,
        _id: &str,
        relationship: &str,
        related_id: Option<&str>,
    ) -> ApiResult<JsonApiResponse> {
        let body = match (relationship, related_id) {
            ("author", _) => {
                let author = people().into_iter().find(|p| p["id"] == 2);
                scope.serialize_related(&author, false).await?
            }
            ("reviewers", None) => scope.serialize_related(&people(), true).await?,
            ("reviewers", Some(related_id)) => {
                let reviewer = people()
                    .into_iter()
                    .find(|p| p["id"].to_string() == related_id)
                    .ok_or_else(|| JsonApiError::resource_not_found(None))?;
                scope.serialize_related(&reviewer, false).await?
            }
            _ => return Err(JsonApiError::not_found().into()),
        };
        Ok(scope.to_response(body, None))
    }

    fn inclusion(&self) -> Inclusion<'_> {
        Inclusion::Supported(self)
    }
}

struct ArticleAuthor;

impl RequestHooks for ArticleAuthor {}

#[async_trait]
impl RelationshipResource for ArticleAuthor {
    fn options(&self) -> RelationshipOptions {
        RelationshipOptions::new("articles", "author")
    }

    async fn get(&self, scope: &RelationshipScope<'_>, _parent_id: &str) -> ApiResult<JsonApiResponse> {
        let body = scope.serialize(&Articles::article()).await?;
        Ok(scope.to_response(body, None))
    }

    async fn post(&self, scope: &RelationshipScope<'_>, _parent_id: &str) -> ApiResult<JsonApiResponse> {
        let linkage = scope.deserialize_ids().await?;
        let body = scope
            .serialize(&json!({ "author_id": linkage.into_value() }))
            .await?;
        Ok(scope.to_response(body, None))
    }
}

fn test_app(resource: TestResource) -> Router {
    let mut app = JsonApi::new();
    app.register(resource, "/").unwrap();
    app.into_router().unwrap()
}

fn blog_app() -> Router {
    let mut app = JsonApi::new().with_url_prefix("http://testserver/");
    app.register(People { schema: people_schema() }, "/").unwrap();
    app.register(Articles { schema: article_schema() }, "/").unwrap();
    app.register_relationship(ArticleAuthor).unwrap();
    app.into_router().unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_body(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, JSONAPI_MEDIA_TYPE)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn get_single_resource() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let (status, body) = send(router, get("/test-resource/bar")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"data": {"id": "bar", "type": "test-resource", "attributes": {"name": "foo"}}})
    );
}

#[tokio::test]
async fn responses_use_jsonapi_media_type() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let response = router.oneshot(get("/test-resource/bar")).await.unwrap();
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        JSONAPI_MEDIA_TYPE
    );
}

#[tokio::test]
async fn missing_object_is_a_404_document() {
    let router = test_app(TestResource::new(Vec::new()));
    let (status, body) = send(router, get("/test-resource/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"errors": [
            {"detail": "Resource object not found."}
        ]})
    );
}

#[tokio::test]
async fn unmatched_path_is_a_404_document() {
    let router = test_app(TestResource::new(Vec::new()));
    let (status, body) = send(router, get("/elsewhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"errors": [{"detail": "Not Found"}]}));
}

#[tokio::test]
async fn post_without_type_is_rejected() {
    let router = test_app(TestResource::new(Vec::new()));
    let (status, body) = send(
        router,
        with_body(
            Method::POST,
            "/test-resource/",
            json!({"data": {"attributes": {"name": "foo"}}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["detail"].as_str())
        .collect();
    assert_eq!(
        details,
        vec!["`data` object must include `type` key.", "Bad Request"]
    );
}

#[tokio::test]
async fn post_creates_resource() {
    let router = test_app(TestResource::new(Vec::new()));
    let (status, body) = send(
        router,
        with_body(
            Method::POST,
            "/test-resource/",
            json!({"data": {"type": "test-resource", "attributes": {"name": "foo"}}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], "new");
    assert_eq!(body["data"]["attributes"]["name"], "foo");
}

#[tokio::test]
async fn collection_is_reachable_without_trailing_slash() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let (status, body) = send(router, get("/test-resource")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn content_type_is_required_for_writes() {
    for content_type in [None, Some("application/json")] {
        let router = test_app(TestResource::new(Vec::new()));
        let mut request = Request::builder().method(Method::POST).uri("/test-resource/");
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let request = request
            .body(Body::from(
                json!({"data": {"type": "test-resource", "attributes": {"name": "foo"}}})
                    .to_string(),
            ))
            .unwrap();
        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["errors"][0]["detail"],
            "Incorrect or missing Content-Type header, expected `application/vnd.api+json`."
        );
    }
}

#[tokio::test]
async fn unimplemented_handlers_answer_405() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let (status, body) = send(
        router.clone(),
        with_body(Method::PATCH, "/test-resource/bar", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"errors": [{"detail": "Method Not Allowed"}]}));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/test-resource/bar")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"errors": [{"detail": "Method Not Allowed"}]}));
}

#[tokio::test]
async fn delete_renders_empty_body() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/test-resource/bar")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn unknown_sparse_field_drops_attributes() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let (status, body) = send(
        router,
        get("/test-resource/bar?fields%5Btest-resource%5D=non-existent"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"id": "bar", "type": "test-resource"}}));
}

#[tokio::test]
async fn malformed_sparse_fields_are_rejected() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let (status, body) = send(router, get("/test-resource/bar?fields%5B%5D=name")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["detail"], "Incorrect sparse fields request.");
}

#[tokio::test]
async fn default_page_size_is_enforced() {
    let items = (1..=4)
        .map(|i| json!({"id": i.to_string(), "name": format!("item {i}")}))
        .collect();
    let router = test_app(TestResource::new(items).paginated(2));
    let (status, body) = send(router, get("/test-resource/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["links"],
        json!({
            "first": "/test-resource/?page%5Bnumber%5D=1&page%5Bsize%5D=2",
            "next": "/test-resource/?page%5Bnumber%5D=2&page%5Bsize%5D=2",
            "prev": null,
            "last": "/test-resource/?page%5Bnumber%5D=2&page%5Bsize%5D=2",
        })
    );
}

#[tokio::test]
async fn invalid_page_size_is_a_400() {
    let router = test_app(TestResource::new(Vec::new()).paginated(2));
    let (status, body) = send(router, get("/test-resource/?page%5Bsize%5D=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"][0]["detail"],
        "page[size] must be a positive integer; got abc"
    );
}

#[tokio::test]
async fn include_requires_support() {
    let router = test_app(TestResource::new(vec![json!({"id": "bar", "name": "foo"})]));
    let (status, body) = send(router, get("/test-resource/bar?include=owner")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"][0]["detail"],
        "Inclusion of related resources is not supported."
    );
}

#[tokio::test]
async fn compound_document_with_sparse_fields() {
    let (status, body) = send(
        blog_app(),
        get("/articles/1?include=author&fields%5Bpeople%5D=name"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["relationships"]["author"]["data"],
        json!({"type": "people", "id": "2"})
    );
    assert_eq!(
        body["included"],
        json!([{
            "type": "people",
            "id": "2",
            "attributes": {"name": "Grace"},
            "links": {"self": "http://testserver/people/2"}
        }])
    );
    assert_eq!(body["data"]["attributes"]["title"], "Notes");
}

#[tokio::test]
async fn int_mask_rejects_non_integer_ids() {
    let (status, _) = send(blog_app(), get("/people/abc")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(blog_app(), get("/people/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["links"]["self"], "http://testserver/people/1");
}

#[tokio::test]
async fn related_routes_serialize_with_related_schema() {
    let (status, body) = send(blog_app(), get("/articles/1/author")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "people");
    assert_eq!(body["data"]["id"], "2");
    assert_eq!(body["links"]["self"], "http://testserver/articles/1/author");

    let (status, body) = send(blog_app(), get("/articles/1/reviewers/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attributes"]["name"], "Ada");

    let (status, body) = send(blog_app(), get("/articles/1/reviewers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn single_relationships_have_no_item_route() {
    let (status, _) = send(blog_app(), get("/articles/1/author/2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn relationship_linkage_document() {
    let (status, body) = send(blog_app(), get("/articles/1/relationships/author")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"type": "people", "id": "2"}}));
}

#[tokio::test]
async fn relationship_can_be_emptied() {
    let (status, body) = send(
        blog_app(),
        with_body(
            Method::POST,
            "/articles/1/relationships/author",
            json!({"data": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": null}));
}

#[tokio::test]
async fn relationship_linkage_is_validated() {
    let (status, body) = send(
        blog_app(),
        with_body(
            Method::POST,
            "/articles/1/relationships/author",
            json!({"data": [{"type": "people", "id": "1"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["detail"], "Relationship is not list-like");

    let (status, body) = send(
        blog_app(),
        with_body(
            Method::POST,
            "/articles/1/relationships/author",
            json!({"meta": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["detail"], "Must include a `data` key");
}

#[tokio::test]
async fn relationship_defaults_answer_405() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/articles/1/relationships/author")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(blog_app(), request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

struct ReadOnly {
    inner: TestResource,
}

static READ_ONLY: [Method; 1] = [Method::GET];

#[async_trait]
impl RequestHooks for ReadOnly {
    fn allowed_methods(&self) -> &[Method] {
        &READ_ONLY
    }

    async fn before_request(
        &self,
        request: &JsonApiRequest,
        context: &mut RequestContext,
    ) -> ApiResult<()> {
        if request.query_param("deny").is_some() {
            return Err(JsonApiError::with_detail(StatusCode::FORBIDDEN, "Denied.").into());
        }
        context.insert("seen", json!(true));
        Ok(())
    }

    async fn after_request(
        &self,
        _request: &JsonApiRequest,
        context: &RequestContext,
        response: &mut JsonApiResponse,
    ) -> ApiResult<()> {
        if context.get("seen").is_some() {
            response
                .headers_mut()
                .insert("x-hooked", header::HeaderValue::from_static("yes"));
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for ReadOnly {
    fn options(&self) -> ResourceOptions {
        self.inner.options()
    }

    async fn get(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        self.inner.get(scope, id).await
    }

    async fn delete(&self, scope: &Scope<'_>, id: &str) -> ApiResult<JsonApiResponse> {
        self.inner.delete(scope, id).await
    }
}

#[tokio::test]
async fn hooks_wrap_every_request() {
    let mut app = JsonApi::new();
    app.register(
        ReadOnly {
            inner: TestResource::new(vec![json!({"id": "bar", "name": "foo"})]),
        },
        "/",
    )
    .unwrap();
    let router = app.into_router().unwrap();

    let response = router
        .clone()
        .oneshot(get("/test-resource/bar"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-hooked").unwrap(), "yes");

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/test-resource/bar")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get("x-hooked").unwrap(), "yes");

    let response = router
        .oneshot(get("/test-resource/bar?deny=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get("x-hooked").is_none());
}

#[test]
fn registration_requires_type_and_schema() {
    struct Untyped;
    impl RequestHooks for Untyped {}
    impl Resource for Untyped {
        fn options(&self) -> ResourceOptions {
            ResourceOptions::default()
        }
    }

    let err = JsonApi::new().register(Untyped, "/").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot register a resource without specifying its `type_` and its `schema`."
    );
}

#[test]
fn relationship_requires_registered_parent() {
    let mut app = JsonApi::new();
    let err = app.register_relationship(ArticleAuthor).unwrap_err();
    assert!(matches!(err, RegistrationError::ParentNotRegistered));

    app.register(Articles { schema: article_schema() }, "/").unwrap();
    struct Editors;
    impl RequestHooks for Editors {}
    impl RelationshipResource for Editors {
        fn options(&self) -> RelationshipOptions {
            RelationshipOptions::new("articles", "editors")
        }
    }
    let err = app.register_relationship(Editors).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Parent schema does not define `editors` relationship."
    );
}

#[test]
fn unknown_related_resource_fails_at_freeze() {
    let mut app = JsonApi::new();
    app.register(Articles { schema: article_schema() }, "/").unwrap();
    assert!(matches!(
        app.freeze(),
        Err(RegistrationError::Registry(_))
    ));
}

#[test]
fn routes_are_named_and_versioned() {
    let mut app = JsonApi::new();
    app.register(People { schema: people_schema() }, "/").unwrap();
    struct PeopleV2(People);
    impl RequestHooks for PeopleV2 {}
    impl Resource for PeopleV2 {
        fn options(&self) -> ResourceOptions {
            self.0.options().register_as("v2-people")
        }
    }
    app.register(
        PeopleV2(People {
            schema: people_schema(),
        }),
        "/v2",
    )
    .unwrap_err();

    let schema = people_schema();
    let mut app = JsonApi::new();
    app.register(People { schema: schema.clone() }, "/").unwrap();
    app.register(PeopleV2(People { schema }), "/v2").unwrap();
    assert_eq!(app.url_path_for("people:get", &[("id", "3")]).unwrap(), "/people/3");
    assert_eq!(
        app.url_path_for("v2-people:get", &[("id", "3")]).unwrap(),
        "/v2/people/3"
    );
    assert_eq!(app.url_path_for("v2-people:get_many", &[]).unwrap(), "/v2/people/");
    assert!(app.url_path_for("people:get", &[("id", "x")]).is_err());
}

#[test]
fn openapi_describes_registered_routes() {
    let mut app = JsonApi::new();
    app.register(People { schema: people_schema() }, "/").unwrap();
    app.register(Articles { schema: article_schema() }, "/").unwrap();
    app.register_relationship(ArticleAuthor).unwrap();
    let doc = app.freeze().unwrap().openapi("Blog", "1.0");

    let get = &doc["paths"]["/people/{id}"]["get"];
    assert_eq!(get["tags"], json!(["people"]));
    assert_eq!(get["parameters"][0]["schema"]["type"], "integer");
    assert!(doc["paths"]["/articles/{id}/relationships/author"]["post"].is_object());
    assert!(doc["paths"]["/articles/{id}/reviewers/{related_id}"]["get"].is_object());
    assert!(doc["components"]["schemas"]["people"].is_object());
    assert!(doc["components"]["schemas"]["ErrorObject"].is_object());
}
