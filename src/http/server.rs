//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Hold the current CompiledRoute and swap it on reload
//! - Serve until shutdown is signalled

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::proxy::{CompiledRoute, HyperUpstream, Orchestrator, RouteError, Upstream};

/// Application state injected into handlers.
pub struct AppState<U> {
    pub route: Arc<ArcSwap<CompiledRoute>>,
    pub orchestrator: Arc<Orchestrator<U>>,
}

impl<U> Clone for AppState<U> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<U: Upstream> AppState<U> {
    pub fn new(route: CompiledRoute, orchestrator: Orchestrator<U>) -> Self {
        Self {
            route: Arc::new(ArcSwap::from_pointee(route)),
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
    route: Arc<ArcSwap<CompiledRoute>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, RouteError> {
        let route = CompiledRoute::compile(config.route.clone())?;
        let upstream = HyperUpstream::new(&config.timeouts);
        let orchestrator = Orchestrator::new(upstream, config.edge.clone(), &config.limits);

        let state = AppState::new(route, orchestrator);
        let route = Arc::clone(&state.route);
        let router = build_router(state);

        Ok(Self { router, route })
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// New configurations received on `config_updates` replace the route
    /// for subsequent requests; in-flight requests keep the route they
    /// started with.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let route = Arc::clone(&self.route);
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                match CompiledRoute::compile(new_config.route) {
                    Ok(compiled) => {
                        tracing::info!(
                            backend = ?compiled.backend().map(|b| b.token.to_string()),
                            rules = compiled.admission().rule_count(),
                            "Route reloaded"
                        );
                        route.store(Arc::new(compiled));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded route, keeping current one");
                    }
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router<U: Upstream>(state: AppState<U>) -> Router {
    Router::new()
        .route("/{*path}", any(proxy_handler::<U>))
        .route("/", any(proxy_handler::<U>))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
        )
}

/// Main proxy handler: every method, every path.
async fn proxy_handler<U: Upstream>(
    State(state): State<AppState<U>>,
    request: Request<Body>,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let route = state.route.load_full();
    state.orchestrator.handle(&route, request, peer).await
}
