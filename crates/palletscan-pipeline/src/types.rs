//! Structured result payload produced by the pipeline.
//!
//! These types serialize to the wire/storage shape consumed by the worker
//! and the API; field names are part of the external contract.

use serde::{Deserialize, Serialize};

/// Sentinel content for a QR detected but never decoded.
pub const PENDING_SCAN: &str = "PENDING_SCAN";
/// Sentinel content for a QR whose every decode attempt failed.
pub const DECODE_FAILED: &str = "DECODE_FAILED";

/// Axis-aligned bounding box. Coordinates are pixels; whether they are in
/// processed or original image space depends on the pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl BoundingBox {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Top-left corner of a QR's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// Which decode branch produced a QR's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeSource {
    /// The per-crop strategy ladder succeeded.
    Crop,
    /// The single full-image decode succeeded.
    Direct,
    /// Nothing decoded; content is a sentinel.
    None,
}

/// One general-object detection in original-image coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    pub object_id: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Whether (and where) a QR crop was persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropInfo {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<CropSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_success: Option<bool>,
}

impl CropInfo {
    pub fn not_saved() -> Self {
        Self {
            saved: false,
            path: None,
            size: None,
            decode_success: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CropSize {
    pub width: i64,
    pub height: i64,
}

/// One QR detection with its decode outcome, original-image coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCode {
    pub qr_id: String,
    /// Decoded string, or [`PENDING_SCAN`] / [`DECODE_FAILED`].
    pub content: String,
    pub decode_source: DecodeSource,
    pub position: Position,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub crop_info: CropInfo,
}

/// Stage-A bookkeeping needed to reconcile coordinates back to the
/// original image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreprocessMeta {
    pub scale_factor: f64,
    /// Side length of the square letterbox target.
    pub target_size: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub x_offset: i64,
    pub y_offset: i64,
}

/// Run-level metadata attached to every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetadata {
    /// ISO-8601 UTC completion timestamp.
    pub timestamp: String,
    /// `WxH` of the original image.
    pub image_resolution: String,
    /// Wall-clock from pipeline entry to assembly completion.
    pub processing_time_ms: u64,
    /// Source path, or `"array"` for in-memory inputs.
    pub image_source: String,
    pub preprocessing: PreprocessMeta,
}

/// Aggregate counts over a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_detections: usize,
    pub objects_count: usize,
    pub qr_codes_count: usize,
    pub classes_detected: Vec<String>,
    pub qr_crops_saved: usize,
    pub qr_codes_decoded: usize,
}

/// Descriptor of the persisted annotated image, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImageInfo {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ProcessedImageInfo {
    pub fn not_saved() -> Self {
        Self {
            saved: false,
            path: None,
            filename: None,
        }
    }
}

/// Complete output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_metadata: ScanMetadata,
    pub detected_objects: Vec<DetectedObject>,
    pub qr_codes: Vec<QrCode>,
    pub summary: Summary,
    pub processed_image: ProcessedImageInfo,
    pub source_file_removed: bool,
}
