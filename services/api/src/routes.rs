use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use track_features::{ExtractError, FeatureExtractor};
use track_requests::{
    analyze_input, extractor_for, request_id, AnalyzeRequest, AnalyzeResponse, FeedbackMetadata, InputPayload,
    LimitError, Limits, PayloadError,
};

/// Headroom for the JSON envelope around a base64 upload.
const ENVELOPE_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    limits: Limits,
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(limits: Limits, max_concurrency: usize) -> Self {
        Self { limits, permits: Arc::new(Semaphore::new(max_concurrency.max(1))) }
    }

    /// Load and extract one uploaded track on the blocking pool, holding a
    /// concurrency permit for the whole extraction.
    async fn extract_track(&self, extractor: FeatureExtractor, payload: InputPayload) -> Result<FeedbackMetadata, AppError> {
        if let InputPayload::Path { .. } = payload {
            return Err(AppError::BadRequest("path inputs are not accepted over HTTP".into()));
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("extraction pool closed: {e}")))?;
        let limits = self.limits;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let input = payload.load(&limits)?;
            analyze_input(&extractor, &input, &limits)
        })
        .await
        .map_err(|e| AppError::Internal(format!("extraction task failed: {e}")))?
        .map_err(AppError::from)
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    PayloadTooLarge(String),
    Unprocessable(String),
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let msg = format!("{err:#}");
        if let Some(limit) = err.downcast_ref::<LimitError>() {
            return match limit {
                LimitError::UnsupportedExtension(_) => Self::BadRequest(msg),
                LimitError::TooLarge { .. } | LimitError::TooLong { .. } => Self::PayloadTooLarge(msg),
            };
        }
        if let Some(extract) = err.downcast_ref::<ExtractError>() {
            return match extract {
                ExtractError::Decode(_) | ExtractError::EmptyAudio => Self::Unprocessable(msg),
                ExtractError::InvalidConfig(_) => Self::BadRequest(msg),
                ExtractError::Io(_) => Self::Internal(msg),
            };
        }
        if err.downcast_ref::<PayloadError>().is_some() {
            return Self::BadRequest(msg);
        }
        Self::Internal(msg)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let msg = format!("invalid request body: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(msg)
        } else {
            Self::BadRequest(msg)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            warn!(%status, error = %message, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = (state.limits.max_file_bytes as usize / 3 * 4).saturating_add(ENVELOPE_BYTES);
    Router::new()
        .route("/health", get(health))
        .route("/v1/features", post(features))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn features(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(req) = body?;
    let request_id = request_id(req.request_id.as_deref());
    let extractor = extractor_for(req.config.as_ref())?;

    let main = state.extract_track(extractor.clone(), req.main);
    let reference = async {
        match req.reference {
            Some(payload) => state.extract_track(extractor.clone(), payload).await.map(Some),
            None => Ok(None),
        }
    };
    let (main, reference) = tokio::try_join!(main, reference)?;

    info!(%request_id, with_reference = reference.is_some(), degraded = ?main.degraded, "features served");
    Ok(Json(AnalyzeResponse { request_id, main, reference }))
}
