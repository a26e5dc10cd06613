pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, SinkServiceConfig};
pub use errors::{
    CodecError, ConfigError, DeliveryError, ModelLoadError, RecognitionError, ValidationError,
};
pub use types::{
    DeliveryOutcome, ErrorBody, FailureReason, TransactionState, ValidationOutcome,
    ValidationRequest, Verdict, VerdictPayload,
};
