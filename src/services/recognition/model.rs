// Scoring model abstraction and the ONNX-backed classifier

use crate::core::config::ModelConfig;
use crate::core::errors::{ModelLoadError, RecognitionError, RecognitionResult};
use crate::services::onnx_builder::{build_session, OnnxSessionPool};
use ndarray::Array4;
use ort::value::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Opaque classifier: `[1, 1, 28, 28]` grey tensor in, one score per class out.
///
/// Implementations are shared read-only across concurrent transactions.
pub trait ScoringModel: Send + Sync {
    fn score(&self, input: Array4<f32>) -> RecognitionResult<Vec<f32>>;

    /// Short description for logs
    fn describe(&self) -> String {
        "scoring model".to_string()
    }
}

/// Sign classifier running through ONNX Runtime
pub struct OnnxClassifier {
    pool: OnnxSessionPool,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    backend: String,
}

impl OnnxClassifier {
    /// Load the model and fill the session pool. Any failure here is fatal.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelLoadError> {
        let model_path = config.model_path.clone();
        if !model_path.is_file() {
            return Err(ModelLoadError::NotFound(model_path));
        }

        let backend_pref = config.inference_backend.as_deref();
        let session_error = |e: anyhow::Error| ModelLoadError::Session {
            path: model_path.clone(),
            reason: format!("{e:#}"),
        };

        info!("Loading sign classifier from {}", model_path.display());
        let (backend, first) = build_session(&model_path, backend_pref, config.intra_threads)
            .map_err(session_error)?;

        let input_name = first
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ModelLoadError::NoInputs {
                path: model_path.clone(),
            })?;
        let output_name = first
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelLoadError::NoOutputs {
                path: model_path.clone(),
            })?;

        let pool = OnnxSessionPool::new(config.session_pool_size);
        pool.add(first).map_err(session_error)?;

        for i in 1..config.session_pool_size {
            debug!("Creating session {} of {}", i + 1, config.session_pool_size);
            let (_, session) = build_session(&model_path, backend_pref, config.intra_threads)
                .map_err(session_error)?;
            pool.add(session).map_err(session_error)?;
        }

        info!(
            "✓ Sign classifier ready: {} ({} sessions, input '{}')",
            backend, config.session_pool_size, input_name
        );

        Ok(Self {
            pool,
            input_name,
            output_name,
            model_path,
            backend,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    fn run(&self, input: Array4<f32>) -> RecognitionResult<Vec<f32>> {
        let shape: [usize; 4] = {
            let dims = input.shape();
            [dims[0], dims[1], dims[2], dims[3]]
        };
        let (data, _offset) = input.into_raw_vec_and_offset();
        let value = Value::from_array((shape, data))?;

        let mut session = self.pool.acquire()?;
        let result = (|| -> RecognitionResult<Vec<f32>> {
            let outputs = session.run(ort::inputs![self.input_name.as_str() => value])?;
            let (_, scores) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
            if scores.is_empty() {
                return Err(RecognitionError::InvalidModelOutput(
                    "sign classifier produced no scores".to_string(),
                ));
            }
            Ok(scores.to_vec())
        })();
        self.pool.release(session);

        result
    }
}

impl ScoringModel for OnnxClassifier {
    fn score(&self, input: Array4<f32>) -> RecognitionResult<Vec<f32>> {
        self.run(input)
    }

    fn describe(&self) -> String {
        format!("onnx:{} ({})", self.model_path.display(), self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_load_failure() {
        let config = ModelConfig {
            model_path: PathBuf::from("definitely/not/here.onnx"),
            session_pool_size: 1,
            intra_threads: 1,
            inference_backend: None,
        };
        match OnnxClassifier::load(&config) {
            Err(ModelLoadError::NotFound(path)) => {
                assert_eq!(path, PathBuf::from("definitely/not/here.onnx"))
            }
            other => panic!("expected NotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_garbage_model_is_session_failure() {
        let path = std::env::temp_dir().join(format!("garbage-{}.onnx", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not an onnx model").unwrap();
        let config = ModelConfig {
            model_path: path.clone(),
            session_pool_size: 1,
            intra_threads: 1,
            inference_backend: Some("cpu".to_string()),
        };
        let result = OnnxClassifier::load(&config);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ModelLoadError::Session { .. })));
    }
}
