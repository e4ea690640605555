//! Web server module.

mod handlers;

use crate::config::ServerConfig;
use crate::dashboard::Dashboard;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub dashboard: Arc<Dashboard>,
}

/// Web server for kpiboard.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, dashboard: Arc<Dashboard>) -> Self {
        Self {
            state: AppState { config, dashboard },
        }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = routes(self.state.clone());

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Build the router with all routes.
pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/api/panels", get(handlers::handle_get_panels))
        .route("/api/panels/{id}", get(handlers::handle_get_panel))
        .route("/api/panels/{id}/rows", post(handlers::handle_read_rows))
        .route("/api/params", get(handlers::handle_get_params))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024)) // 4MB of result rows
        .with_state(state)
}
