use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use fb_core::Error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

const DEFAULT_ARTICLE_LIMIT: usize = 20;
const MAX_ARTICLE_LIMIT: usize = 200;

/// Maps a failed operation to `500 {success: false, error}`.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tasks = state.scheduler.status().await;
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "tasks": tasks,
    }))
}

pub async fn trigger(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    info!("manual trigger requested over HTTP");
    let summary = state.pipeline.trigger_now().await.map_err(|e| {
        error!("manual trigger failed: {}", e);
        e
    })?;
    Ok(Json(json!({
        "success": true,
        "message": "digest sent",
        "sourcesCount": summary.sources_count,
        "destinationsCount": summary.destinations_count,
        "count": summary.articles_count,
    })))
}

pub async fn list_sources(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let sources = state.config.enabled_sources().await?;
    Ok(Json(json!({ "success": true, "data": sources })))
}

#[derive(Debug, Deserialize)]
pub struct ArticlesQuery {
    limit: Option<usize>,
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ARTICLE_LIMIT)
        .min(MAX_ARTICLE_LIMIT);
    let articles = state.store.recent_articles(limit).await?;
    Ok(Json(json!({ "success": true, "data": articles })))
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "path": uri.path() })),
    )
}
