//! Pipeline configuration.
//!
//! The free-form config mapping of early prototypes is collapsed into an
//! explicit record; only the keys that actually influence processing exist.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Preprocessing knobs for stage A.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side length of the square letterbox target, in pixels.
    pub target_size: u32,
    /// Re-range pixel values after resizing (no-op for u8 buffers, kept for
    /// parity with deployments that feed float tensors downstream).
    pub normalize: bool,
    /// Apply the gentle gamma boost before resizing ("enhanced" mode).
    pub enhance_contrast: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_size: 640,
            normalize: true,
            enhance_contrast: false,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Minimum detector confidence θ for a detection to be reported.
    pub confidence_threshold: f32,
    /// Directory where QR crops are written when `save_crops` is set.
    pub qr_crops_dir: PathBuf,
    /// Directory where annotated visualizations are written.
    pub processed_images_dir: PathBuf,
    /// Run stage C at all. When off, QR-sink detections are still reported
    /// but never decoded.
    pub enable_qr_detection: bool,
    /// Persist each QR crop as `{qr_id}_crop.jpg`.
    pub save_crops: bool,
    /// Persist an annotated copy of the original image.
    pub save_processed_images: bool,
    pub preprocessing: PreprocessConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            qr_crops_dir: PathBuf::from("qr_crops"),
            processed_images_dir: PathBuf::from("outputs/processed_images"),
            enable_qr_detection: true,
            save_crops: false,
            save_processed_images: false,
            preprocessing: PreprocessConfig::default(),
        }
    }
}

/// Per-task overrides merged onto [`ProcessorConfig`] defaults.
///
/// Carried inside the job metadata under the `config` key; absent fields
/// leave the default untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_crops_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_images_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_qr_detection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_crops: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_processed_images: Option<bool>,
}

impl ProcessorConfig {
    /// Apply per-task overrides, returning the merged configuration.
    pub fn merged(&self, overrides: &ProcessorOverrides) -> ProcessorConfig {
        let mut merged = self.clone();
        if let Some(threshold) = overrides.confidence_threshold {
            merged.confidence_threshold = threshold;
        }
        if let Some(ref dir) = overrides.qr_crops_dir {
            merged.qr_crops_dir = dir.clone();
        }
        if let Some(ref dir) = overrides.processed_images_dir {
            merged.processed_images_dir = dir.clone();
        }
        if let Some(enable) = overrides.enable_qr_detection {
            merged.enable_qr_detection = enable;
        }
        if let Some(save) = overrides.save_crops {
            merged.save_crops = save;
        }
        if let Some(save) = overrides.save_processed_images {
            merged.save_processed_images = save;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.confidence_threshold, 0.5);
        assert!(config.enable_qr_detection);
        assert!(!config.save_crops);
        assert_eq!(config.preprocessing.target_size, 640);
    }

    #[test]
    fn test_merge_overrides_partial() {
        let config = ProcessorConfig::default();
        let overrides = ProcessorOverrides {
            confidence_threshold: Some(0.85),
            save_crops: Some(true),
            ..Default::default()
        };

        let merged = config.merged(&overrides);
        assert_eq!(merged.confidence_threshold, 0.85);
        assert!(merged.save_crops);
        // Untouched fields keep their defaults
        assert!(merged.enable_qr_detection);
        assert_eq!(merged.processed_images_dir, config.processed_images_dir);
    }

    #[test]
    fn test_overrides_deserialize_from_sparse_json() {
        let overrides: ProcessorOverrides =
            serde_json::from_str(r#"{"confidence_threshold": 0.3}"#).unwrap();
        assert_eq!(overrides.confidence_threshold, Some(0.3));
        assert!(overrides.save_crops.is_none());
    }
}
