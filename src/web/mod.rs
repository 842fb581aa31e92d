//! Web interface for background removal
//!
//! A single-page app served from an embedded HTML string plus a small
//! JSON/multipart API: upload an image, pick a model, optionally enable
//! alpha matting, and get back a transparent PNG.

pub mod handlers;
pub mod page;

use crate::error::Result;
use crate::session_pool::SessionPool;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Maximum accepted upload size (bytes)
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for the web handlers
#[derive(Clone)]
pub struct AppState {
    pool: Arc<SessionPool>,
}

impl AppState {
    /// Create state around an existing session pool
    #[must_use]
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }
}

/// Build the application router
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/models", get(handlers::list_models))
        .route("/api/remove", post(handlers::remove_background))
        .route("/healthz", get(handlers::healthz))
        // Raise axum's built-in 2 MB multipart limit; the tower-http layer
        // still caps the request body overall
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the web interface until the task is cancelled
///
/// # Errors
/// - Failed to bind the listen address
/// - Server I/O errors
pub async fn serve(addr: SocketAddr, pool: Arc<SessionPool>) -> Result<()> {
    let app = router(AppState::new(pool));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| crate::error::RemovalError::network_error("Failed to bind address", e))?;
    tracing::info!(addr = %addr, "web interface listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::RemovalError::network_error("Server error", e))?;
    Ok(())
}
