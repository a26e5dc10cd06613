use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::core::config::SinkConfig;
use crate::core::errors::{DeliveryError, DeliveryResult};
use crate::core::types::{DeliveryOutcome, VerdictPayload, TRANSACTION_ID_HEADER};
use crate::utils::Metrics;

/// HTTP client pushing verdicts to the sink.
///
/// Delivery is a best-effort side channel: every attempt is bounded by a
/// timeout, transient failures are retried with exponential backoff and
/// jitter, and the result is reported as a [`DeliveryOutcome`] instead of an
/// error.
#[derive(Clone)]
pub struct VerdictClient {
    http_client: reqwest::Client,
    endpoint: reqwest::Url,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
    metrics: Option<Metrics>,
}

impl VerdictClient {
    /// Returns `Ok(None)` when no sink URL is configured
    pub fn from_config(config: &SinkConfig, metrics: Option<Metrics>) -> Result<Option<Self>> {
        let Some(ref url) = config.url else {
            return Ok(None);
        };
        let endpoint = reqwest::Url::parse(url)
            .with_context(|| format!("Invalid verdict sink URL: {}", url))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Some(Self {
            http_client,
            endpoint,
            timeout: config.timeout,
            max_retries: config.max_retries,
            backoff_base: config.backoff_base,
            metrics,
        }))
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    /// Deliver one verdict, retrying transient failures
    #[instrument(skip(self, payload), fields(sink = %self.endpoint))]
    pub async fn deliver(&self, transaction_id: Uuid, payload: VerdictPayload) -> DeliveryOutcome {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.send_once(transaction_id, payload).await {
                Ok(()) => {
                    debug!(
                        "Verdict delivered in {:.1}ms ({} attempt(s))",
                        start.elapsed().as_secs_f64() * 1000.0,
                        attempts
                    );
                    if let Some(ref m) = self.metrics {
                        m.record_delivery_delivered();
                    }
                    return DeliveryOutcome::Delivered { attempts };
                }
                Err(e) => {
                    let retries_used = attempts - 1;
                    if e.is_retryable() && retries_used < self.max_retries {
                        let delay = self.backoff_delay(retries_used);
                        debug!(
                            "Verdict delivery failed: {}. Retrying in {}ms ({}/{})",
                            e,
                            delay.as_millis(),
                            retries_used + 1,
                            self.max_retries
                        );
                        if let Some(ref m) = self.metrics {
                            m.record_delivery_retry();
                        }
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    warn!("Verdict delivery failed after {} attempt(s): {}", attempts, e);
                    if let Some(ref m) = self.metrics {
                        m.record_delivery_failed();
                    }
                    return DeliveryOutcome::Failed {
                        attempts,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn send_once(&self, transaction_id: Uuid, payload: VerdictPayload) -> DeliveryResult<()> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header(TRANSACTION_ID_HEADER, transaction_id.to_string())
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn classify(&self, error: reqwest::Error) -> DeliveryError {
        if error.is_timeout() {
            DeliveryError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            DeliveryError::Http(error)
        }
    }

    /// Exponential backoff with up to 50% jitter, saturating at `u64::MAX` ms
    fn backoff_delay(&self, retry: u32) -> Duration {
        let base_ms = self.backoff_base.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(2_u64.saturating_pow(retry));
        let jitter_ms = rand::random::<u64>() % (base_ms / 2 + 1);
        Duration::from_millis(exp_ms.saturating_add(jitter_ms))
    }
}
