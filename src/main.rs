// Main entry point for the sign-letter validator

use sign_validator::{
    core::{config::level_directive, Config},
    orchestration::ValidationCoordinator,
    routes::{shutdown_signal, validator_router, AppState},
    services::{OnnxClassifier, RecognitionEngine, VerdictClient},
    utils::Metrics,
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new().context("Failed to load configuration")?;

    let level = level_directive(config.log_level());
    let filter = EnvFilter::new(format!(
        "sign_validator={},ort=off,tower_http={}",
        level, level
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== SIGN LETTER VALIDATOR ===");
    info!(
        "Config: model={} sessions={} backend={} scratch={}",
        config.model.model_path.display(),
        config.model.session_pool_size,
        config.model.inference_backend.as_deref().unwrap_or("auto"),
        config.scratch.dir.display()
    );

    let metrics = Metrics::new();

    // Model loading is the only fatal step after configuration
    let model_config = config.model.clone();
    let classifier = tokio::task::spawn_blocking(move || OnnxClassifier::load(&model_config))
        .await
        .context("Model loading task failed")?
        .context("Failed to load sign classifier")?;
    let engine = Arc::new(RecognitionEngine::new(Arc::new(classifier)));
    let model = engine.model_description();

    let sink = VerdictClient::from_config(&config.sink, Some(metrics.clone()))?;
    match sink {
        Some(ref client) => info!(
            "Verdicts delivered to {} (timeout {}ms, {} retries)",
            client.endpoint(),
            config.sink.timeout.as_millis(),
            config.sink.max_retries
        ),
        None => warn!("VERDICT_SINK_URL is empty, verdict delivery disabled"),
    }

    let coordinator = Arc::new(ValidationCoordinator::new(
        engine,
        sink,
        config.scratch.dir.clone(),
        metrics.clone(),
    ));
    let state = AppState {
        coordinator,
        metrics,
        model,
    };
    let app = validator_router(state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                 - Root endpoint");
    info!("  GET  /health           - Health check");
    info!("  GET  /metrics          - Prometheus metrics");
    info!("  GET  /stats            - Detailed statistics");
    info!("  POST /validate         - Validate a photo (answers True/False)");
    info!("  POST /api/v1/validate  - Validate a photo (answers JSON outcome)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
