// Error types for the validation pipeline
//
// One thiserror enum per concern. Only ModelLoadError and ConfigError are
// fatal, and only at startup; everything else is reported per transaction.

use std::path::PathBuf;
use thiserror::Error;

/// Transport text could not be turned back into bytes
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid base64 encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

/// Recognition engine errors
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Image bytes are not a decodable image: {0}")]
    DecodeFailure(#[from] image::ImageError),

    #[error("Failed to read scratch image {path}: {source}")]
    ScratchRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Model predicted class {index}, which has no letter")]
    UnmappedLabel { index: usize },

    #[error("ONNX inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("Invalid model output: {0}")]
    InvalidModelOutput(String),

    #[error("Session pool unavailable: {0}")]
    SessionPool(String),
}

/// Verdict delivery errors (never fatal to a transaction)
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Verdict sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Verdict sink did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Verdict sink rejected payload: {status} - {body}")]
    Rejected { status: u16, body: String },
}

impl DeliveryError {
    /// Client errors mean the payload itself was refused; repeating it won't help
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Http(_) | DeliveryError::Timeout { .. } => true,
            DeliveryError::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// Model loading errors (fatal at startup)
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to build inference session for {path}: {reason}")]
    Session { path: PathBuf, reason: String },

    #[error("Model {path} has no inputs")]
    NoInputs { path: PathBuf },

    #[error("Model {path} has no outputs")]
    NoOutputs { path: PathBuf },
}

/// Failure of a single validation transaction
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidEncoding(#[from] CodecError),

    #[error("Unsupported letter {0:?}: expected a single static sign letter (A-Y, excluding J)")]
    UnsupportedLetter(String),

    #[error("Scratch storage failed: {0}")]
    Scratch(#[source] std::io::Error),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error("Recognition task join failed: {0}")]
    TaskJoin(String),
}

impl ValidationError {
    /// Stable machine-readable kind, used in API error bodies and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidEncoding(_) => "invalid_encoding",
            ValidationError::UnsupportedLetter(_) => "unsupported_letter",
            ValidationError::Scratch(_) => "scratch_io",
            ValidationError::Recognition(e) => match e {
                RecognitionError::DecodeFailure(_) | RecognitionError::ScratchRead { .. } => {
                    "decode_failure"
                }
                RecognitionError::UnmappedLabel { .. } => "unmapped_label",
                RecognitionError::Inference(_) | RecognitionError::SessionPool(_) => {
                    "inference_failure"
                }
                RecognitionError::InvalidModelOutput(_) => "invalid_model_output",
            },
            ValidationError::TaskJoin(_) => "task_join",
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid verdict sink URL {url:?}: {reason}")]
    InvalidSinkUrl { url: String, reason: String },

    #[error("Invalid validator URL {url:?}: {reason}")]
    InvalidValidatorUrl { url: String, reason: String },

    #[error("{name} must be > 0")]
    MustBePositive { name: &'static str },

    #[error("SINK_MAX_RETRIES must be at most {max}, got {got}")]
    TooManyRetries { max: u32, got: u32 },

    #[error("Unknown inference backend {0:?} (valid: auto, cpu, cuda)")]
    UnknownBackend(String),

    #[error("Invalid sample letter {0:?}")]
    InvalidSampleLetter(String),
}

pub type RecognitionResult<T> = Result<T, RecognitionError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type DeliveryResult<T> = Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = ValidationError::Recognition(RecognitionError::UnmappedLabel { index: 9 });
        assert_eq!(err.kind(), "unmapped_label");
        assert!(err.to_string().contains("class 9"));

        let err = ValidationError::UnsupportedLetter("J".to_string());
        assert_eq!(err.kind(), "unsupported_letter");
    }

    #[test]
    fn test_delivery_retry_policy() {
        assert!(DeliveryError::Timeout { timeout_ms: 10 }.is_retryable());
        assert!(DeliveryError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(!DeliveryError::Rejected { status: 400, body: String::new() }.is_retryable());
    }
}
