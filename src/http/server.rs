//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared application state from configuration
//! - Create the Axum router: dispatch routes first, forwarding as fallback
//! - Wire up middleware (request id, tracing, body limit, metrics)
//! - Serve until Ctrl+C or SIGTERM

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, MatchedPath, Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::ProxyConfig;
use crate::forward::{ForwardMethod, ForwardRequest, ForwardResponse, Forwarder};
use crate::http::error::ApiError;
use crate::http::request::{make_span, propagate_request_id_layer, request_id, set_request_id_layer};
use crate::observability::metrics;
use crate::platform::Platform;
use crate::store::{CollectionStore, DocumentStore, MemoryStore};
use crate::upstream::{HttpUpstream, Upstream, UpstreamResult};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub upstream: Option<Arc<dyn Upstream>>,
    pub forwarder: Forwarder,
    pub documents: CollectionStore,
    pub platform: Platform,
}

impl AppState {
    /// State backed by the HTTP upstream and in-process collaborators.
    pub fn from_config(config: ProxyConfig) -> UpstreamResult<Self> {
        let upstream = HttpUpstream::from_config(&config.upstream)?;
        let backend = Arc::new(MemoryStore::new(config.store.default_page_size));
        let platform = Platform::local(upstream.clone());
        Ok(Self::new(config, upstream, backend, platform))
    }

    pub fn new(
        config: ProxyConfig,
        upstream: Option<Arc<dyn Upstream>>,
        backend: Arc<dyn DocumentStore>,
        platform: Platform,
    ) -> Self {
        Self {
            config: Arc::new(config),
            forwarder: Forwarder::new(upstream.clone()),
            upstream,
            documents: CollectionStore::new(backend),
            platform,
        }
    }
}

/// HTTP server for the service proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        let max_body_size = state.config.security.max_body_size;

        api::setup_api_router(state.clone())
            .fallback(forward_handler)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(DefaultBodyLimit::max(max_body_size))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(set_request_id_layer())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Requests no dispatch route claimed go to the external service.
async fn forward_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let method = ForwardMethod::try_from(&method).map_err(|m| ApiError::MethodNotAllowed(m.to_string()))?;
    let query: Vec<(String, String)> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let request_id = request_id(&headers).to_string();

    let request = ForwardRequest {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body: (!body.is_empty()).then_some(body),
    };

    match state.forwarder.forward(request).await {
        Ok(Some(response)) => Ok(response.into_response()),
        Ok(None) => Err(ApiError::NotFound("No upstream service configured".to_string())),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Upstream request failed");
            Ok(ForwardResponse::failure(e.to_string()).into_response())
        }
    }
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "forward".to_string());

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), started);
    response
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
