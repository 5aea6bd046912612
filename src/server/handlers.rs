//! Route handlers and the JSON error body.
//!
//! Request failures map to `400` (invalid input, unknown category) or `503`
//! (models not loaded); the body always carries `detail`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::domain::RawPredictionRequest;
use crate::predict::PredictError;
use crate::server::AppState;

/// A request failure rendered as a JSON error body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError(pub PredictError);

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.0.to_string();
        match self.0 {
            PredictError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            PredictError::UnknownCategory { field, value } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "detail": detail,
                    "field": field.as_str(),
                    "value": value,
                })),
            )
                .into_response(),
            PredictError::ModelsNotLoaded => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "detail": detail }))).into_response()
            }
        }
    }
}

/// The body is parsed by hand so malformed JSON reports like any other
/// invalid input.
pub async fn predict_handler(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let predictor = state.predictor.as_ref().ok_or(PredictError::ModelsNotLoaded)?;

    let raw: RawPredictionRequest = serde_json::from_slice(&body)
        .map_err(|e| PredictError::InvalidInput(format!("Invalid request body: {e}")))?;

    match predictor.predict_raw(&raw) {
        Ok(result) => Ok(Json(result.rounded()).into_response()),
        Err(err) => {
            warn!(error = %err, "prediction rejected");
            Err(err.into())
        }
    }
}

pub async fn health_handler(State(state): State<AppState>) -> Response {
    let loaded = state.models_loaded();
    Json(json!({
        "status": if loaded { "healthy" } else { "unhealthy" },
        "models_loaded": loaded,
    }))
    .into_response()
}

pub async fn model_info_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let predictor = state.predictor.as_ref().ok_or(PredictError::ModelsNotLoaded)?;
    Ok(Json(predictor.bundle().info()).into_response())
}
