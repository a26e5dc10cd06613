use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::core::errors::ValidationError;
use crate::core::types::{ErrorBody, ValidationOutcome, ValidationRequest};
use crate::orchestration::ValidationCoordinator;
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ValidationCoordinator>,
    pub metrics: Metrics,
    pub model: String,
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

pub fn validator_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/validate", post(validate))
        .route("/api/v1/validate", post(validate_detailed))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(super::permissive_cors())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "Sign Letter Validator"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model,
        "sink": state.coordinator.sink_endpoint().map(|url| url.to_string()),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Validate a photo against a letter
///
/// # Request Format:
/// - JSON `{ "user_photo": <base64>, "letter": <char> }`
///
/// # Response:
/// - `True` or `False` as plain text
async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidationRequest>,
) -> Result<&'static str, ErrorResponse> {
    let outcome = state
        .coordinator
        .validate(request)
        .await
        .map_err(error_response)?;
    Ok(outcome.verdict.as_text())
}

/// Same as `/validate`, answering with the full outcome
async fn validate_detailed(
    State(state): State<AppState>,
    Json(request): Json<ValidationRequest>,
) -> Result<Json<ValidationOutcome>, ErrorResponse> {
    state
        .coordinator
        .validate(request)
        .await
        .map(Json)
        .map_err(error_response)
}

fn error_response(err: ValidationError) -> ErrorResponse {
    let kind = err.kind();
    let status = status_for(kind);
    if status.is_server_error() {
        error!("Validation failed with {}: {:?}", status, err);
    }
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
            kind: kind.to_string(),
        }),
    )
}

fn status_for(kind: &str) -> StatusCode {
    match kind {
        "invalid_encoding" | "unsupported_letter" => StatusCode::BAD_REQUEST,
        "decode_failure" | "unmapped_label" => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{CodecError, RecognitionError};

    #[test]
    fn test_status_mapping() {
        let invalid = ValidationError::InvalidEncoding(CodecError::InvalidEncoding(
            base64::DecodeError::InvalidPadding,
        ));
        let (status, Json(body)) = error_response(invalid);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.kind, "invalid_encoding");

        let unmapped = ValidationError::Recognition(RecognitionError::UnmappedLabel { index: 9 });
        let (status, Json(body)) = error_response(unmapped);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.kind, "unmapped_label");

        let model = ValidationError::Recognition(RecognitionError::InvalidModelOutput(
            "empty".to_string(),
        ));
        assert_eq!(error_response(model).0, StatusCode::INTERNAL_SERVER_ERROR);

        let join = ValidationError::TaskJoin("panicked".to_string());
        assert_eq!(error_response(join).0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
