//! Keep-alive HTTP endpoint for the hosting platform's health check.

use crate::config::LivenessConfig;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const ALIVE: &str = "alive";

/// Health check endpoint
pub async fn alive() -> &'static str {
    ALIVE
}

/// Create the liveness router
pub fn create_router() -> Router {
    Router::new()
        .route("/", get(alive))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the liveness endpoint in a background task.
pub async fn spawn(config: &LivenessConfig) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Liveness endpoint listening on http://{}", addr);

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, create_router()).await {
            error!("Liveness server error: {}", e);
        }
    }))
}
