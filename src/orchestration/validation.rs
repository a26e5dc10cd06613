// Validation coordinator: one photo + one expected letter → one verdict
//
// Received → Decoded → Recognized → Verdicted → Delivered → Cleaned → Completed
// Any failure before Verdicted ends in Failed(reason); the scratch guard is
// dropped on every path. Delivery problems never fail a transaction.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::errors::{ValidationError, ValidationResult};
use crate::core::types::{
    DeliveryOutcome, FailureReason, TransactionState, ValidationOutcome, ValidationRequest,
    Verdict,
};
use crate::orchestration::scratch::ScratchImage;
use crate::services::codec;
use crate::services::delivery::VerdictClient;
use crate::services::recognition::{RecognitionEngine, SignLetter};
use crate::utils::Metrics;

/// Drives validation transactions. One instance serves all requests.
pub struct ValidationCoordinator {
    engine: Arc<RecognitionEngine>,
    sink: Option<VerdictClient>,
    scratch_dir: PathBuf,
    metrics: Metrics,
}

/// State tracker for a single transaction
struct Transaction {
    id: Uuid,
    state: TransactionState,
}

impl Transaction {
    fn begin() -> Self {
        let txn = Self {
            id: Uuid::new_v4(),
            state: TransactionState::Received,
        };
        debug!(transaction_id = %txn.id, "Transaction {}", txn.state);
        txn
    }

    fn advance(&mut self, next: TransactionState) {
        debug_assert!(!self.state.is_terminal(), "transaction {} already ended", self.id);
        debug!(transaction_id = %self.id, "Transaction {} → {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, reason: FailureReason, error: ValidationError) -> ValidationError {
        self.advance(TransactionState::Failed(reason));
        error
    }
}

impl ValidationCoordinator {
    pub fn new(
        engine: Arc<RecognitionEngine>,
        sink: Option<VerdictClient>,
        scratch_dir: PathBuf,
        metrics: Metrics,
    ) -> Self {
        Self {
            engine,
            sink,
            scratch_dir,
            metrics,
        }
    }

    pub fn sink_endpoint(&self) -> Option<&reqwest::Url> {
        self.sink.as_ref().map(VerdictClient::endpoint)
    }

    /// Run one transaction to completion or to a typed failure
    #[instrument(skip(self, request), fields(letter = %request.letter))]
    pub async fn validate(&self, request: ValidationRequest) -> ValidationResult<ValidationOutcome> {
        let start = Instant::now();
        self.metrics.record_transaction_started();

        let result = self.run(request).await;
        match result {
            Ok(ref outcome) => {
                self.metrics
                    .record_verdict(outcome.verdict.is_match, start.elapsed());
                info!(
                    transaction_id = %outcome.transaction_id,
                    is_match = outcome.verdict.is_match,
                    delivered = outcome.delivery.is_delivered(),
                    total_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Validation completed"
                );
            }
            Err(ref e) => {
                self.metrics.record_failure(e.kind());
                warn!(kind = e.kind(), "Validation failed: {}", e);
            }
        }
        result
    }

    async fn run(&self, request: ValidationRequest) -> ValidationResult<ValidationOutcome> {
        let mut txn = Transaction::begin();

        let expected = match SignLetter::parse(&request.letter) {
            Some(letter) => letter,
            None => {
                return Err(txn.fail(
                    FailureReason::UnsupportedLetter,
                    ValidationError::UnsupportedLetter(request.letter),
                ))
            }
        };

        let bytes = codec::decode(&request.user_photo)
            .map_err(|e| txn.fail(FailureReason::InvalidEncoding, e.into()))?;
        txn.advance(TransactionState::Decoded);

        let scratch = ScratchImage::create(&self.scratch_dir, txn.id, &bytes)
            .await
            .map_err(|e| txn.fail(FailureReason::Scratch, ValidationError::Scratch(e)))?;
        drop(bytes);

        let recognition_start = Instant::now();
        let engine = Arc::clone(&self.engine);
        let path = scratch.path().to_path_buf();
        let recognition = tokio::task::spawn_blocking(move || engine.evaluate(&path, expected))
            .await
            .map_err(|e| {
                txn.fail(
                    FailureReason::Recognition,
                    ValidationError::TaskJoin(e.to_string()),
                )
            })?
            .map_err(|e| txn.fail(FailureReason::Recognition, e.into()))?;
        self.metrics.record_recognition(recognition_start.elapsed());
        txn.advance(TransactionState::Recognized);

        let verdict = Verdict {
            is_match: recognition.is_match,
            recognized_letter: Some(recognition.letter),
            confidence: Some(recognition.prediction.confidence),
        };
        debug!(
            transaction_id = %txn.id,
            "Expected {}, recognized {} (confidence {:.3})",
            expected,
            recognition.letter,
            recognition.prediction.confidence
        );
        txn.advance(TransactionState::Verdicted);

        let delivery = match self.sink {
            Some(ref client) => client.deliver(txn.id, verdict.payload()).await,
            None => {
                self.metrics.record_delivery_skipped();
                DeliveryOutcome::Skipped
            }
        };
        txn.advance(TransactionState::Delivered);

        scratch.release();
        txn.advance(TransactionState::Cleaned);
        txn.advance(TransactionState::Completed);

        Ok(ValidationOutcome {
            transaction_id: txn.id,
            verdict,
            delivery,
        })
    }
}
