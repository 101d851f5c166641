use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hs_core::Error;
use hs_pipeline::{latest_batch, summarize_latest};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

/// Pipeline failures surface as `500 {"error": ...}`.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> hs_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(Error::Scoring(format!("worker task failed: {}", e))))?
        .map_err(ApiError)
}

pub async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let dir = state.paths.processed_dir.clone();
    let prefix = state.output_prefix().to_string();
    let summary = blocking(move || summarize_latest(&dir, &prefix)).await?;
    Ok(Json(json!({ "latest": summary })))
}

pub async fn get_predictions(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let dir = state.paths.processed_dir.clone();
    let prefix = state.output_prefix().to_string();
    let latest = blocking(move || latest_batch(&dir, &prefix)).await?;
    Ok(Json(match latest {
        Some((_, batch)) => json!(batch),
        None => Value::Null,
    }))
}

pub async fn analyze(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let scorer = state.scorer.clone();
    let raw_dir = state.paths.raw_dir.clone();
    let processed_dir = state.paths.processed_dir.clone();
    let scored = blocking(move || scorer.run_once(&raw_dir, &processed_dir)).await?;

    Ok(Json(match scored {
        Some(scored) => json!({
            "status": "scored",
            "input": scored.input.display().to_string(),
            "output": scored.output.display().to_string(),
            "counts": scored.counts,
        }),
        None => json!({ "status": "idle" }),
    }))
}
