pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::query::answerer::QueryAnswerer;
use crate::query::search::SearchService;

#[derive(Clone)]
pub struct AppState {
    pub answerer: Arc<QueryAnswerer>,
    pub search: SearchService,
    pub video_id: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/ask", get(handlers::ask))
        .route("/ask/", get(handlers::ask))
        .route("/search", get(handlers::search))
        .route("/search/", get(handlers::search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
