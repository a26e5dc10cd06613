// Verdict sink and sample sender

use anyhow::{Context, Result};
use sign_validator::core::{config::level_directive, SinkServiceConfig};
use sign_validator::routes::{shutdown_signal, sink_router, ReceivedVerdict, SinkState};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = SinkServiceConfig::new().context("Failed to load configuration")?;

    let level = level_directive(config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "sign_validator={},verdict_sink={},tower_http={}",
            level, level, level
        )))
        .init();

    let addr = format!("{}:{}", config.host, config.port);
    info!("{}", "=".repeat(70));
    info!("Verdict sink starting on http://{}", addr);
    info!("  GET  /         - Root endpoint");
    info!("  POST /receive  - Receive a verdict");
    info!(
        "  POST /send     - Send {} as '{}' to {}",
        config.sample_image.display(),
        config.sample_letter,
        config.validator_url
    );
    info!("{}", "=".repeat(70));

    let state = SinkState::new(config)?;
    tokio::spawn(tally_verdicts(state.subscribe()));
    let app = sink_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sink shutdown complete");
    Ok(())
}

/// Running match rate over everything received since startup
async fn tally_verdicts(mut verdicts: Receiver<ReceivedVerdict>) {
    let (mut matched, mut total) = (0u64, 0u64);
    loop {
        match verdicts.recv().await {
            Ok(verdict) => {
                total += 1;
                if verdict.recognition {
                    matched += 1;
                }
                info!("Verdicts so far: {}/{} matched", matched, total);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Verdict tally fell behind, {} verdicts not counted", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
