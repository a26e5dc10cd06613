// ONNX Runtime session construction and pooling
//
// Sessions need `&mut self` to run, so concurrent requests each take one
// session out of a bounded pool and put it back when inference is done.

use crate::core::errors::RecognitionError;
use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::{debug, info, warn};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

/// Bounded pool of interchangeable sessions for one model
pub struct OnnxSessionPool {
    sender: Sender<Session>,
    receiver: Receiver<Session>,
    capacity: usize,
}

impl OnnxSessionPool {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Add a freshly built session
    pub fn add(&self, session: Session) -> Result<()> {
        self.sender
            .try_send(session)
            .map_err(|_| anyhow::anyhow!("Session pool is already at capacity {}", self.capacity))
    }

    /// Take a session, blocking until one is free
    pub fn acquire(&self) -> Result<Session, RecognitionError> {
        self.receiver
            .recv()
            .map_err(|e| RecognitionError::SessionPool(e.to_string()))
    }

    /// Return a session taken with [`acquire`](Self::acquire)
    pub fn release(&self, session: Session) {
        if self.sender.try_send(session).is_err() {
            warn!("Session pool full on release, dropping session");
        }
    }
}

/// Build a session for the model at `model_path`.
///
/// `backend` forces a provider (`"cpu"` or `"cuda"`); `None` tries the
/// accelerated providers compiled in and falls back to CPU.
///
/// # Returns
/// (backend_name, Session)
pub fn build_session(
    model_path: &Path,
    backend: Option<&str>,
    intra_threads: usize,
) -> Result<(String, Session)> {
    if let Some(forced) = backend {
        info!("INFERENCE_BACKEND={}, forcing specific backend", forced);
        return try_forced_backend(forced, model_path, intra_threads);
    }

    #[cfg(feature = "cuda")]
    {
        if let Ok(session) = Session::builder()
            .and_then(|b| b.with_execution_providers([CUDAExecutionProvider::default().build()]))
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(intra_threads))
            .and_then(|b| b.commit_from_file(model_path))
        {
            info!("✓ Using CUDA acceleration for {}", model_path.display());
            return Ok(("CUDA".to_string(), session));
        }
    }

    let session = cpu_session(model_path, intra_threads)?;
    debug!("Using CPU inference for {}", model_path.display());
    Ok(("CPU".to_string(), session))
}

fn try_forced_backend(
    backend: &str,
    model_path: &Path,
    intra_threads: usize,
) -> Result<(String, Session)> {
    match backend {
        #[cfg(feature = "cuda")]
        "cuda" => {
            let session = Session::builder()
                .context("Failed to create session builder")?
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .context("Failed to configure CUDA provider")?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .context("Failed to set optimization level")?
                .with_intra_threads(intra_threads)
                .context("Failed to configure intra-op threads")?
                .commit_from_file(model_path)
                .context("Failed to load model with CUDA")?;
            info!("✓ Forced CUDA backend for {}", model_path.display());
            Ok(("CUDA".to_string(), session))
        }
        #[cfg(not(feature = "cuda"))]
        "cuda" => {
            anyhow::bail!("CUDA backend not available. Rebuild with: cargo build --features cuda")
        }
        "cpu" => Ok(("CPU".to_string(), cpu_session(model_path, intra_threads)?)),
        other => anyhow::bail!("Unknown inference backend '{}' (valid: auto, cpu, cuda)", other),
    }
}

fn cpu_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create ONNX session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to configure CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set graph optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to configure intra-op threads")?
        .with_inter_threads(1)
        .context("Failed to configure inter-op threads")?
        .commit_from_file(model_path)
        .with_context(|| {
            format!(
                "Failed to load ONNX model {}. \
                The file may be corrupt or exported with an unsupported opset.",
                model_path.display()
            )
        })
}
