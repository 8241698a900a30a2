//! Worker configuration, fully environment-driven. The worker binary takes
//! no arguments.

use palletscan_pipeline::ProcessorConfig;
use std::env;
use std::path::PathBuf;

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Path to the model manifest loaded into the model slot.
    pub model_path: PathBuf,
    /// Number of independent consumer slots in this process.
    pub concurrency: usize,
    /// Defaults for per-job pipeline configuration; job metadata may carry
    /// overrides under the `config` key.
    pub processor: ProcessorConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/palletscan.json"),
            concurrency: 1,
            processor: ProcessorConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Build a config from the environment.
    ///
    /// Honors `PALLETSCAN_MODEL_PATH`, `PALLETSCAN_WORKER_CONCURRENCY`,
    /// `PALLETSCAN_QR_CROPS_DIR` and `PALLETSCAN_PROCESSED_IMAGES_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("PALLETSCAN_MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Ok(concurrency) = env::var("PALLETSCAN_WORKER_CONCURRENCY") {
            if let Ok(parsed) = concurrency.parse::<usize>() {
                config.concurrency = parsed.max(1);
            }
        }
        if let Ok(dir) = env::var("PALLETSCAN_QR_CROPS_DIR") {
            config.processor.qr_crops_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("PALLETSCAN_PROCESSED_IMAGES_DIR") {
            config.processor.processed_images_dir = PathBuf::from(dir);
        }
        config
    }
}
