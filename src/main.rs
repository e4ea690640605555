//! kpiboard - CI KPI dashboard service
//!
//! Builds the chart panel records for the CI health dashboard and serves
//! them to the browser-side chart renderer.

use kpiboard::config::ServerConfig;
use kpiboard::kpis;
use kpiboard::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("kpiboard=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting kpiboard on port {}...", cfg.http_port);
    tracing::info!(
        "Dashboard window: {} months, current backend preferred: {}",
        cfg.lookback_months,
        cfg.use_current_backend
    );

    let dashboard = Arc::new(kpis::kpi_dashboard(&cfg.start_floors));
    let ids: Vec<&str> = dashboard.panel_ids().collect();
    tracing::info!("Loaded {} panels: {}", ids.len(), ids.join(", "));

    // Start web server
    let server = Server::new(cfg, dashboard.clone());
    server.start().await?;

    Ok(())
}
