use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use shopscout_core::PipelineError;
use shopscout_domains::pipeline::{CleanupReport, Run};
use shopscout_domains::taxonomy::CategoryNode;
use shopscout_domains::{Pipeline, TriggerOutcome};

pub fn build_router(pipeline: Pipeline, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/profiles/{id}/scrape", post(trigger_scrape))
        .route("/profiles/{id}/label", post(trigger_labeling))
        .route("/profiles/{id}/process", post(trigger_processing))
        .route("/profiles/{id}/pipeline", post(trigger_full_pipeline))
        .route("/runs/cleanup", post(cleanup_runs))
        .route("/runs/{id}", get(run_status))
        .route("/runs/{id}/cancel", post(cancel_run))
        .route("/categories/tree", get(category_tree))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { pipeline })
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
}

/// Pipeline error rendered as `{"error": ...}`.
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Cancelled(_) => StatusCode::CONFLICT,
            PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn trigger_response<T: Serialize>(outcome: TriggerOutcome<T>) -> Result<Response, ApiError> {
    match outcome {
        TriggerOutcome::Started(started) => {
            let body = match serde_json::to_value(started).map_err(|e| PipelineError::Other(e.into()))? {
                Value::Object(mut fields) => {
                    fields.insert("status".to_string(), json!("started"));
                    Value::Object(fields)
                }
                other => json!({ "status": "started", "result": other }),
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
        TriggerOutcome::NotApplicable { reason } => Ok((
            StatusCode::OK,
            Json(json!({ "status": "not_applicable", "reason": reason })),
        )
            .into_response()),
    }
}

async fn trigger_scrape(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    trigger_response(state.pipeline.trigger_scrape(id).await?)
}

async fn trigger_labeling(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    trigger_response(state.pipeline.trigger_labeling(id).await?)
}

async fn trigger_processing(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    trigger_response(state.pipeline.trigger_processing(id).await?)
}

async fn trigger_full_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    trigger_response(state.pipeline.trigger_full_pipeline(id).await?)
}

async fn run_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Run>, ApiError> {
    Ok(Json(state.pipeline.get_run_status(id).await?))
}

async fn cancel_run(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Run>, ApiError> {
    Ok(Json(state.pipeline.cancel_run(id).await?))
}

async fn cleanup_runs(State(state): State<AppState>) -> Result<Json<CleanupReport>, ApiError> {
    Ok(Json(state.pipeline.cleanup_stale_runs().await?))
}

async fn category_tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryNode>>, ApiError> {
    Ok(Json(state.pipeline.category_tree().await?))
}

async fn health() -> &'static str {
    "ok"
}
