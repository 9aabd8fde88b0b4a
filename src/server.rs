//! HTTP surface of the inference service

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use crate::types::prediction::PredictionResult;
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// State shared by all handlers; immutable apart from the atomic counters
pub struct AppState {
    pub engine: InferenceEngine,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            engine,
            metrics: ServiceMetrics::new(),
        }
    }
}

/// Error returned from `/predict`
#[derive(Debug)]
pub struct ApiError(pub PredictError);

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PredictError::MissingFeature { .. } | PredictError::InvalidFeature { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PredictError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
            "feature": self.0.feature(),
        });
        (status, Json(body)).into_response()
    }
}

/// Build the router for the service endpoints
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/model", get(model_info))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let start = Instant::now();

    let outcome = payload
        .map_err(|rejection| PredictError::MalformedBody(rejection.body_text()))
        .and_then(|Json(record)| state.engine.predict(&record));

    match outcome {
        Ok(result) => {
            state.metrics.record_prediction(start.elapsed(), &result);
            Ok(Json(result))
        }
        Err(err @ PredictError::Inference(_)) => {
            error!(error = %err, "Prediction failed");
            state.metrics.record_server_error();
            Err(ApiError(err))
        }
        Err(err) => {
            warn!(kind = err.kind(), error = %err, "Rejected prediction request");
            state.metrics.record_client_error(err.kind());
            Err(ApiError(err))
        }
    }
}

async fn model_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let engine = &state.engine;
    Json(json!({
        "features": engine.contract().names(),
        "approval_threshold": engine.approval_threshold(),
        "metadata": engine.metadata(),
    }))
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: &AppConfig, state: Arc<AppState>) -> Result<()> {
    let addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    state.metrics.print_summary();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
