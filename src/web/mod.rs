//! Web server module.

mod handlers;

pub use handlers::*;

use crate::api::WatchApi;
use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
pub struct AppState<A: WatchApi> {
    pub config: ServerConfig,
    pub orchestrator: Arc<Orchestrator<A>>,
}

impl<A: WatchApi> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }
}

/// Web server for the BOCH dashboard.
pub struct Server<A: WatchApi> {
    state: AppState<A>,
}

impl<A: WatchApi> Server<A> {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, orchestrator: Arc<Orchestrator<A>>) -> Self {
        Self {
            state: AppState { config, orchestrator },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            // Dashboard
            .route("/", get(handlers::handle_dashboard::<A>))
            // API endpoints
            .route(
                "/api/watches",
                get(handlers::handle_get_watches::<A>).post(handlers::handle_create_watch::<A>),
            )
            .route(
                "/api/watches/{name}",
                put(handlers::handle_update_watch::<A>).delete(handlers::handle_delete_watch::<A>),
            )
            .route("/api/watches/{name}/toggle", post(handlers::handle_toggle_watch::<A>))
            .route("/api/watches/{name}/graph", get(handlers::handle_get_graph::<A>))
            .route("/api/health", get(handlers::handle_get_health::<A>))
            .route("/api/refresh", post(handlers::handle_refresh::<A>))
            .route("/api/policy", get(handlers::handle_get_policy::<A>))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(64 * 1024)) // 64KB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
