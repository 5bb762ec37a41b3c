//! Resolution API: Axum web server in front of the consensus engine.
//!
//! Exposes the resolution endpoint consumed by the on-chain oracle
//! fulfiller plus a provider listing and a health check.
//! CORS enabled for browser callers.

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use routes::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/resolve", post(routes::resolve))
        .route("/api/providers", get(routes::get_providers))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API address {addr}"))?;

    info!(%addr, "Resolution API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
