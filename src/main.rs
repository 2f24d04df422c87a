//! BOCH Dashboard
//!
//! Polls the BOCH watch API and serves a stoplight view of every watch.

use boch_dashboard::api::ApiClient;
use boch_dashboard::config::ServerConfig;
use boch_dashboard::orchestrator::Orchestrator;
use boch_dashboard::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("boch_dashboard=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting BOCH dashboard on port {}...", cfg.http_port);
    tracing::info!("Using BOCH API at {}", cfg.api_base_url);

    let policy = Arc::new(cfg.load_policy()?);
    tracing::info!(
        "Status policy: {} warning {} ms, critical {} ms",
        policy.latency_label(),
        policy.warning_latency_ms,
        policy.critical_latency_ms
    );

    let client = ApiClient::new(&cfg.api_base_url, &cfg.api_host, &cfg.api_key, cfg.request_timeout())?;
    if !client.has_api_key() {
        tracing::warn!("BOCH_API_KEY is not set; every request will be rejected");
    }

    // Start the refresh loop; the first tick refreshes immediately
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(client), policy));
    orchestrator.start(cfg.refresh_interval()).await;

    // Start web server
    let server = Server::new(cfg, orchestrator.clone());
    let result = server.start().await;

    orchestrator.stop().await;
    result
}
