use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use chess_eval_core::{Analyzer, DeepEvaluation, Error, LineEvaluation, QuickEvaluation, StatusHint};

use crate::AppState;

#[derive(Deserialize)]
pub struct EvalRequest {
    pub fen: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/eval", post(quick_eval))
        .route("/eval/deep", post(deep_eval))
        .route("/eval/line", post(line_eval))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn quick_eval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvalRequest>,
) -> Result<Json<QuickEvaluation>, ApiError> {
    run_blocking(state, move |analyzer| analyzer.quick_evaluate(&req.fen))
        .await
        .map(Json)
}

pub async fn deep_eval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvalRequest>,
) -> Result<Json<DeepEvaluation>, ApiError> {
    run_blocking(state, move |analyzer| analyzer.deep_evaluate(&req.fen))
        .await
        .map(Json)
}

pub async fn line_eval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvalRequest>,
) -> Result<Json<LineEvaluation>, ApiError> {
    run_blocking(state, move |analyzer| analyzer.line_evaluate(&req.fen))
        .await
        .map(Json)
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pool = state.analyzer.pool_status();
    let status = if pool.closed { "shutting_down" } else { "ok" };
    Json(json!({
        "status": status,
        "pool": pool,
        "cache_entries": state.analyzer.cache().len(),
    }))
}

/// Engine calls block on process I/O and the pool's wait queue, so keep them off the async workers
async fn run_blocking<T, F>(state: Arc<AppState>, job: F) -> Result<T, ApiError>
where
    F: FnOnce(&Analyzer) -> chess_eval_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || job(&state.analyzer))
        .await
        .map_err(|e| {
            error!(error = %e, "analysis task panicked");
            ApiError::internal("analysis task failed")
        })?
        .map_err(ApiError::from)
}

/// JSON error body: `{"error": ..., "status": "badRequest" | "busy" | "serverError"}`
pub struct ApiError {
    status: StatusCode,
    hint: StatusHint,
    message: String,
}

impl ApiError {
    fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            hint: StatusHint::ServerError,
            message: message.to_string(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let hint = e.status_hint();
        let status = match hint {
            StatusHint::BadRequest => {
                debug!(error = %e, "bad request");
                StatusCode::BAD_REQUEST
            }
            StatusHint::Busy => {
                warn!(error = %e, "engines busy");
                StatusCode::SERVICE_UNAVAILABLE
            }
            StatusHint::ServerError => {
                error!(error = %e, "analysis error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            hint,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.hint,
        }));
        (self.status, body).into_response()
    }
}
