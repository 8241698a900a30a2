//! Process-wide model slot.
//!
//! The detection model is loaded exactly once per worker process, on first
//! need, keyed by `(model_path, confidence_threshold)`. A request with the
//! same key returns the same instance; a different key evicts and rebuilds.
//! Rebuilds are serialized by the slot mutex, and the slot is never
//! rebuilt while a caller holds the returned handle; inference sees a
//! read-only detector.

use crate::error::WorkerError;
use palletscan_pipeline::{ObjectDetector, PipelineError, StaticDetector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Cache key for the model slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelKey {
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
}

/// Factory building a detector for a key. Deployment-specific inference
/// runtimes plug in here.
pub type DetectorFactory =
    dyn Fn(&ModelKey) -> Result<Arc<dyn ObjectDetector>, PipelineError> + Send + Sync;

/// Single-instance model cache.
pub struct ModelSlot {
    factory: Box<DetectorFactory>,
    slot: Mutex<Option<(ModelKey, Arc<dyn ObjectDetector>)>>,
}

impl ModelSlot {
    pub fn new(factory: Box<DetectorFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Slot backed by the JSON model-manifest loader.
    pub fn with_manifest_loader() -> Self {
        Self::new(Box::new(|key: &ModelKey| {
            let detector = StaticDetector::from_manifest(Path::new(&key.model_path))?;
            Ok(Arc::new(detector) as Arc<dyn ObjectDetector>)
        }))
    }

    /// Return the cached detector for `key`, loading (or rebuilding on a
    /// key change) under the slot lock.
    pub async fn get_or_load(&self, key: ModelKey) -> Result<Arc<dyn ObjectDetector>, WorkerError> {
        let mut slot = self.slot.lock().await;

        if let Some((current, detector)) = slot.as_ref() {
            if *current == key {
                return Ok(Arc::clone(detector));
            }
            info!(
                old = %current.model_path.display(),
                new = %key.model_path.display(),
                "model key changed, rebuilding slot"
            );
        } else {
            info!(model = %key.model_path.display(), "cold-loading model");
        }

        let detector = (self.factory)(&key)?;
        *slot = Some((key, Arc::clone(&detector)));
        Ok(detector)
    }
}
