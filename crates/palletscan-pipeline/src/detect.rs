//! Stage B: object detection behind a pluggable interface.
//!
//! Weight formats and inference runtimes are external collaborators; the
//! pipeline only consumes the [`ObjectDetector`] trait. The crate ships a
//! manifest-backed [`StaticDetector`] used by the test-suite and fixture
//! deployments.

use crate::error::PipelineError;
use crate::types::BoundingBox;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// A single raw detection in processed-image coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: i64,
    pub class_name: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Detection backend. Implementations must be cheap to share across jobs;
/// the worker holds one instance per process behind its model slot.
pub trait ObjectDetector: Send + Sync {
    /// Label set the backend was trained on.
    fn labels(&self) -> &[String];

    /// Run inference on a preprocessed buffer, returning every detection
    /// at or above the confidence threshold.
    fn detect(
        &self,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, PipelineError>;
}

/// A general-object detection after sink routing, still in processed
/// coordinates until stage D runs.
#[derive(Debug, Clone)]
pub struct ObjectHit {
    pub object_id: String,
    pub class_name: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// A QR-sink detection after routing.
#[derive(Debug, Clone)]
pub struct QrHit {
    pub qr_id: String,
    pub class_name: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Routed detections plus the deduplicated class list.
#[derive(Debug, Clone, Default)]
pub struct RoutedDetections {
    pub objects: Vec<ObjectHit>,
    pub qr_codes: Vec<QrHit>,
    pub classes_detected: Vec<String>,
}

/// Split raw detections into the QR sink and the general-object sink.
///
/// Routing is by class name: anything containing `qr` or `barcode`
/// (case-insensitive) is a QR candidate. Each detection gets a fresh
/// UUID-based id.
pub fn route_detections(raw: Vec<RawDetection>) -> RoutedDetections {
    let mut routed = RoutedDetections::default();

    for detection in raw {
        let unique = Uuid::new_v4();
        let lowered = detection.class_name.to_lowercase();
        if lowered.contains("qr") || lowered.contains("barcode") {
            routed.qr_codes.push(QrHit {
                qr_id: format!("QR_{unique}"),
                class_name: detection.class_name,
                confidence: detection.confidence,
                bounding_box: detection.bounding_box,
            });
        } else {
            routed.objects.push(ObjectHit {
                object_id: format!("OBJ_{unique}"),
                class_name: detection.class_name,
                confidence: detection.confidence,
                bounding_box: detection.bounding_box,
            });
        }
    }

    let mut classes: Vec<String> = routed
        .objects
        .iter()
        .map(|o| o.class_name.clone())
        .chain(routed.qr_codes.iter().map(|q| q.class_name.clone()))
        .collect();
    classes.sort();
    classes.dedup();
    routed.classes_detected = classes;

    routed
}

/// JSON model manifest consumed by [`StaticDetector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub labels: Vec<String>,
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// Detector replaying a fixed detection set from a model manifest.
///
/// Used by tests and by deployments that feed pre-annotated scenes;
/// inference runtimes plug in behind [`ObjectDetector`] instead.
#[derive(Debug, Clone)]
pub struct StaticDetector {
    labels: Vec<String>,
    detections: Vec<RawDetection>,
}

impl StaticDetector {
    pub fn new(labels: Vec<String>, detections: Vec<RawDetection>) -> Self {
        Self { labels, detections }
    }

    /// Load a manifest file (`.json`) from disk.
    pub fn from_manifest(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidModel(format!("{}: {e}", path.display()))
        })?;
        let manifest: ModelManifest = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::InvalidModel(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            labels = manifest.labels.len(),
            detections = manifest.detections.len(),
            "loaded model manifest"
        );
        Ok(Self::new(manifest.labels, manifest.detections))
    }
}

impl ObjectDetector for StaticDetector {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn detect(
        &self,
        _image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, PipelineError> {
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(class_name: &str, confidence: f32) -> RawDetection {
        RawDetection {
            class_id: 0,
            class_name: class_name.to_string(),
            confidence,
            bounding_box: BoundingBox::new(10, 10, 50, 50),
        }
    }

    #[test]
    fn test_routing_by_class_name() {
        let routed = route_detections(vec![
            raw("pallet", 0.9),
            raw("qr_code", 0.8),
            raw("Barcode-Label", 0.7),
            raw("box", 0.6),
        ]);

        assert_eq!(routed.objects.len(), 2);
        assert_eq!(routed.qr_codes.len(), 2);
        assert!(routed.objects.iter().all(|o| o.object_id.starts_with("OBJ_")));
        assert!(routed.qr_codes.iter().all(|q| q.qr_id.starts_with("QR_")));
    }

    #[test]
    fn test_routing_ids_are_unique() {
        let routed = route_detections(vec![raw("pallet", 0.9), raw("pallet", 0.9)]);
        assert_ne!(routed.objects[0].object_id, routed.objects[1].object_id);
    }

    #[test]
    fn test_classes_detected_deduplicated() {
        let routed = route_detections(vec![
            raw("pallet", 0.9),
            raw("pallet", 0.8),
            raw("qr_code", 0.7),
        ]);
        assert_eq!(routed.classes_detected, vec!["pallet", "qr_code"]);
    }

    #[test]
    fn test_static_detector_filters_by_threshold() {
        let detector = StaticDetector::new(
            vec!["pallet".to_string()],
            vec![raw("pallet", 0.9), raw("pallet", 0.3)],
        );
        let image = RgbImage::new(640, 640);

        let hits = detector.detect(&image, 0.5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].confidence, 0.9);
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let manifest = ModelManifest {
            labels: vec!["pallet".to_string(), "qr_code".to_string()],
            detections: vec![raw("pallet", 0.92)],
        };
        std::fs::write(&path, serde_json::to_string(&manifest).unwrap()).unwrap();

        let detector = StaticDetector::from_manifest(&path).unwrap();
        assert_eq!(detector.labels().len(), 2);
        let hits = detector
            .detect(&RgbImage::new(640, 640), 0.5)
            .unwrap();
        assert_eq!(hits[0].class_name, "pallet");
    }

    #[test]
    fn test_manifest_missing_file() {
        let err = StaticDetector::from_manifest(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidModel(_)));
    }
}
