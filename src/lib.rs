// Library exports for the sign-letter validation service

// Core modules
pub mod core;
pub mod orchestration;
pub mod routes;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        CodecError, ConfigError, DeliveryError, ModelLoadError, RecognitionError, ValidationError,
    },
    types::{DeliveryOutcome, ValidationOutcome, ValidationRequest, Verdict, VerdictPayload},
};

pub use orchestration::ValidationCoordinator;

pub use services::{OnnxClassifier, RecognitionEngine, ScoringModel, SignLetter, VerdictClient};

pub use utils::Metrics;
