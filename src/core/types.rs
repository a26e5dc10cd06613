// Wire and transaction types shared by the validator and the sink

use crate::services::recognition::SignLetter;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Body of `POST /validate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Base64-encoded photo
    pub user_photo: String,
    /// Expected letter, one character
    pub letter: String,
}

/// Outcome of comparing the recognized letter with the expected one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_match: bool,
    pub recognized_letter: Option<SignLetter>,
    pub confidence: Option<f32>,
}

impl Verdict {
    /// What the sink receives
    pub fn payload(&self) -> VerdictPayload {
        VerdictPayload {
            recognition: self.is_match,
        }
    }

    /// Legacy text answer of `POST /validate`
    pub fn as_text(&self) -> &'static str {
        if self.is_match {
            "True"
        } else {
            "False"
        }
    }
}

/// Body delivered to the verdict sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPayload {
    pub recognition: bool,
}

/// Header carrying the transaction id on verdict delivery
pub const TRANSACTION_ID_HEADER: &str = "x-transaction-id";

/// How the side-channel delivery of a verdict ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, reason: String },
    /// No sink configured
    Skipped,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Why a transaction ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    UnsupportedLetter,
    InvalidEncoding,
    Scratch,
    Recognition,
}

/// Lifecycle of one validation transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Received,
    Decoded,
    Recognized,
    Verdicted,
    Delivered,
    Cleaned,
    Completed,
    Failed(FailureReason),
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Completed | TransactionState::Failed(_))
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Failed(reason) => write!(f, "Failed({:?})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Result of a completed transaction, returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub transaction_id: Uuid,
    pub verdict: Verdict,
    pub delivery: DeliveryOutcome,
}

/// Error body returned by both services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let verdict = Verdict {
            is_match: true,
            recognized_letter: SignLetter::parse("A"),
            confidence: Some(0.9),
        };
        assert_eq!(
            serde_json::to_value(verdict.payload()).unwrap(),
            serde_json::json!({ "recognition": true })
        );
        assert_eq!(verdict.as_text(), "True");
    }

    #[test]
    fn test_verdict_json_is_camel_case() {
        let verdict = Verdict {
            is_match: false,
            recognized_letter: SignLetter::parse("b"),
            confidence: None,
        };
        let json = serde_json::to_value(verdict).unwrap();
        assert_eq!(json["isMatch"], false);
        assert_eq!(json["recognizedLetter"], "B");
        assert!(json["confidence"].is_null());
        assert_eq!(verdict.as_text(), "False");
    }

    #[test]
    fn test_delivery_outcome_tagging() {
        let json = serde_json::to_value(DeliveryOutcome::Delivered { attempts: 1 }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "delivered", "attempts": 1 }));
        let json = serde_json::to_value(DeliveryOutcome::Skipped).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "skipped" }));
    }
}
