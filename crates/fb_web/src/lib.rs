use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/trigger", post(handlers::trigger))
        .route("/api/sources", get(handlers::list_sources))
        .route("/api/articles", get(handlers::list_articles))
        .fallback(handlers::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: std::net::SocketAddr, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub mod prelude {
    pub use crate::{create_app, AppState};
    pub use fb_core::{Error, Result};
}
