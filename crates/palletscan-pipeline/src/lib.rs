//! # Detection Pipeline
//!
//! **Pure image-to-result pipeline: preprocessing, object detection, QR
//! extraction and coordinate reconciliation.**
//!
//! One call to [`VisionProcessor::process_image`] takes image bytes through
//! four stages:
//!
//! 1. **Preprocessing**: decode, letterbox-resize to a square detector
//!    input, record the scale/offset metadata.
//! 2. **Detection**: run the configured [`ObjectDetector`]; route each
//!    detection into the QR sink or the general-object sink by class name.
//! 3. **QR decoding**: crop each QR candidate out of the *original*
//!    image and walk the decode strategy ladder; a single full-image
//!    decode acts as fallback.
//! 4. **Reconciliation & assembly**: map every bounding box back to
//!    original-image coordinates and assemble the structured result.
//!
//! Inference runtimes and QR symbol readers are consumed through the
//! [`ObjectDetector`] and [`SymbolDecoder`] traits; the crate ships a
//! manifest-backed detector and an `rqrr`-backed decoder.

pub mod config;
pub mod coords;
pub mod crops;
pub mod decoder;
pub mod detect;
pub mod error;
pub mod filters;
pub mod ladder;
pub mod preprocess;
pub mod processor;
pub mod types;

pub use config::{PreprocessConfig, ProcessorConfig, ProcessorOverrides};
pub use decoder::{DirectDecode, RqrrDecoder, SymbolDecoder};
pub use detect::{ModelManifest, ObjectDetector, RawDetection, StaticDetector};
pub use error::PipelineError;
pub use preprocess::Preprocessor;
pub use processor::{ImageSource, ProcessOptions, VisionProcessor};
pub use types::{
    BoundingBox, CropInfo, DecodeSource, DetectedObject, Position, PreprocessMeta,
    ProcessedImageInfo, QrCode, ScanMetadata, ScanResult, Summary, DECODE_FAILED, PENDING_SCAN,
};
