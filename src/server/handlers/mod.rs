use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use super::AppState;
use crate::CodexrError;
use crate::orchestrator::AssistantRequest;
use crate::speech::{Transcription, validate_wav};

/// Error body shared by every endpoint: `{"status": "error", "message": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[inline]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CodexrError> for ApiError {
    fn from(error: CodexrError) -> Self {
        match error {
            CodexrError::Input(message) => Self::new(StatusCode::BAD_REQUEST, message),
            other => {
                error!("Request failed: {}", other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    index_loaded: bool,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeParams {
    pub filename: Option<String>,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        index_loaded: state.orchestrator.retrieval().is_loaded().await,
    })
}

pub async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<AssistantRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected query body: {}", rejection.body_text());
        ApiError::new(rejection.status(), rejection.body_text())
    })?;

    let response = state.orchestrator.handle(request).await?;
    Ok(Json(response.with_snippet()))
}

pub async fn transcribe_handler(
    State(state): State<AppState>,
    Query(params): Query<TranscribeParams>,
    body: Bytes,
) -> Result<Json<Transcription>, ApiError> {
    let filename = params.filename.unwrap_or_else(|| "audio.wav".to_string());
    validate_wav(&filename, &body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let Some(speech) = state.speech.as_ref() else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Transcription is not configured (set speech.api_key or OPENAI_API_KEY)",
        ));
    };

    let transcription = speech.transcribe(&body, &filename).await.map_err(|e| {
        warn!("Transcription failed: {}", e);
        ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    Ok(Json(transcription))
}
