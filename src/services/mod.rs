pub mod codec;
pub mod delivery;
pub mod onnx_builder; // Shared ONNX session builder and pool
pub mod recognition;

// Re-export commonly used services
pub use delivery::VerdictClient;
pub use recognition::{OnnxClassifier, RecognitionEngine, ScoringModel, SignLetter};
