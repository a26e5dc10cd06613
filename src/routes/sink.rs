// Companion service: receives verdicts and sends sample photos to the validator

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::config::SinkServiceConfig;
use crate::core::types::{ErrorBody, ValidationRequest, VerdictPayload, TRANSACTION_ID_HEADER};
use crate::services::codec;

/// Verdicts kept for slow subscribers before they start lagging
const VERDICT_BUFFER: usize = 64;

/// A verdict as seen by the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedVerdict {
    pub transaction_id: Option<String>,
    pub recognition: bool,
}

#[derive(Clone)]
pub struct SinkState {
    http_client: reqwest::Client,
    config: Arc<SinkServiceConfig>,
    verdicts: broadcast::Sender<ReceivedVerdict>,
}

impl SinkState {
    pub fn new(config: SinkServiceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let (verdicts, _) = broadcast::channel(VERDICT_BUFFER);

        Ok(Self {
            http_client,
            config: Arc::new(config),
            verdicts,
        })
    }

    /// Stream of every verdict received from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ReceivedVerdict> {
        self.verdicts.subscribe()
    }
}

pub fn sink_router(state: SinkState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/receive", post(receive))
        .route("/send", post(send))
        .with_state(state)
        .layer(super::permissive_cors())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "Sign Letter Verdict Sink"
}

async fn receive(
    State(state): State<SinkState>,
    headers: HeaderMap,
    Json(payload): Json<VerdictPayload>,
) -> Json<VerdictPayload> {
    let transaction_id = headers
        .get(TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    info!(
        transaction_id = transaction_id.as_deref().unwrap_or("-"),
        recognition = payload.recognition,
        "Verdict received"
    );

    // No subscribers is not an error
    let _ = state.verdicts.send(ReceivedVerdict {
        transaction_id,
        recognition: payload.recognition,
    });

    Json(payload)
}

/// Post the configured sample photo to the validator and relay its answer
async fn send(
    State(state): State<SinkState>,
) -> Result<(StatusCode, String), (StatusCode, Json<ErrorBody>)> {
    let config = &state.config;
    let bytes = tokio::fs::read(&config.sample_image).await.map_err(|e| {
        warn!("Cannot read sample image {}: {}", config.sample_image.display(), e);
        failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "sample_unreadable",
            format!("Cannot read {}: {}", config.sample_image.display(), e),
        )
    })?;

    let request = ValidationRequest {
        user_photo: codec::encode(&bytes),
        letter: config.sample_letter.to_string(),
    };
    info!(
        "Sending {} ({} bytes) as '{}' to {}",
        config.sample_image.display(),
        bytes.len(),
        request.letter,
        config.validator_url
    );

    let response = state
        .http_client
        .post(&config.validator_url)
        .json(&request)
        .send()
        .await
        .map_err(|e| {
            warn!("Validator unreachable: {}", e);
            failure(
                StatusCode::BAD_GATEWAY,
                "validator_unreachable",
                e.to_string(),
            )
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        failure(
            StatusCode::BAD_GATEWAY,
            "validator_unreachable",
            e.to_string(),
        )
    })?;
    info!("Validator answered {}: {}", status, body);

    Ok((status, body))
}

fn failure(status: StatusCode, kind: &str, error: String) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error,
            kind: kind.to_string(),
        }),
    )
}
