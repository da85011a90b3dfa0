//! HTTP host for JSON:API applications: middleware stack, health and OpenAPI
//! endpoints, and the serving loop with graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::{ArcSwap, ArcSwapOption};
use axum::{
    middleware::{from_fn, map_response},
    routing::get,
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

mod config;
pub mod request_id;
mod router_cache;
mod web;

pub use config::{ApiIngressConfig, ConfigError, MODULE_NAME};
use router_cache::RouterCache;

pub struct ApiIngress {
    config: ArcSwap<ApiIngressConfig>,
    openapi: ArcSwapOption<Value>,
    router_cache: RouterCache<Router>,
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            openapi: ArcSwapOption::empty(),
            router_cache: RouterCache::new(Router::new()),
        }
    }

    pub fn config(&self) -> ApiIngressConfig {
        (**self.config.load()).clone()
    }

    /// Document served at `/openapi.json` when docs are enabled.
    pub fn set_openapi(&self, doc: Value) {
        self.openapi.store(Some(Arc::new(doc)));
    }

    pub fn cached_router(&self) -> Arc<Router> {
        self.router_cache.load()
    }

    /// Wraps the application router with the host routes and middleware and caches the result.
    pub fn build_router(&self, app: Router) -> Router {
        let config = self.config();
        let mut router = Router::new().route("/health", get(web::health_check));

        match (config.enable_docs, self.openapi.load_full()) {
            (true, Some(doc)) => {
                tracing::info!("serving OpenAPI document at /openapi.json");
                router = router.route(
                    "/openapi.json",
                    get(move || web::serve_openapi(doc.clone())),
                );
            }
            (true, None) => tracing::warn!("docs enabled but no OpenAPI document was set"),
            _ => {}
        }

        let mut router = router.merge(app);

        // Each call wraps the previous ones, so the stack reads innermost first:
        // BodyLimit <- CORS <- Timeout <- jsonapi_error_bodies <- push_req_id_to_extensions
        //   <- Trace <- PropagateRequestId <- SetRequestId
        router = router.layer(RequestBodyLimitLayer::new(config.body_limit_bytes));
        if config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        router = router.layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )));
        router = router.layer(map_response(web::jsonapi_error_bodies));
        router = router.layer(from_fn(request_id::push_req_id_to_extensions));
        router = router.layer(request_id::create_trace_layer());

        let x_request_id = request_id::header();
        router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
        router = router.layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId));

        self.router_cache.store(router.clone());
        router
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config().socket_addr()?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))
    }

    /// Binds the configured address and serves the cached router until `cancel` fires.
    pub async fn serve(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_on(listener, cancel).await
    }

    pub async fn serve_on(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let router = (*self.cached_router()).clone();
        tracing::info!(addr = %listener.local_addr()?, "HTTP server bound");

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}
