//! Pipeline orchestration: preprocessing → detection → QR decoding →
//! coordinate reconciliation → payload assembly.

use crate::config::ProcessorConfig;
use crate::coords;
use crate::crops::{self, QrCrop};
use crate::decoder::{DirectDecode, SymbolDecoder};
use crate::detect::{self, ObjectDetector, QrHit};
use crate::error::PipelineError;
use crate::filters;
use crate::ladder;
use crate::preprocess::Preprocessor;
use crate::types::{
    BoundingBox, CropInfo, CropSize, DecodeSource, DetectedObject, Position, ProcessedImageInfo,
    QrCode, ScanMetadata, ScanResult, Summary, DECODE_FAILED, PENDING_SCAN,
};
use chrono::Utc;
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Input to a pipeline run.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Memory(RgbImage),
}

/// Per-run flags, layered on top of [`ProcessorConfig`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Persist QR crops for this run (also requires `config.save_crops`).
    pub save_qr_crops: bool,
    /// Best-effort removal of the source file after processing. Only
    /// meaningful for path sources; never fails the run.
    pub remove_source_file: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            save_qr_crops: true,
            remove_source_file: false,
        }
    }
}

/// The detection pipeline. Pure with respect to its inputs: one call maps
/// an image to a structured result, with filesystem writes only behind the
/// explicit save flags.
pub struct VisionProcessor {
    config: ProcessorConfig,
    preprocessor: Preprocessor,
    detector: Arc<dyn ObjectDetector>,
    decoder: Arc<dyn SymbolDecoder>,
}

impl VisionProcessor {
    pub fn new(
        config: ProcessorConfig,
        detector: Arc<dyn ObjectDetector>,
        decoder: Arc<dyn SymbolDecoder>,
    ) -> Self {
        let preprocessor = Preprocessor::new(config.preprocessing.clone());
        Self {
            config,
            preprocessor,
            detector,
            decoder,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Run the full pipeline over one image.
    pub fn process_image(
        &self,
        source: ImageSource,
        opts: &ProcessOptions,
    ) -> Result<ScanResult, PipelineError> {
        let started = Instant::now();

        let (original, image_source) = match &source {
            ImageSource::Path(path) => {
                (Preprocessor::load_image(path)?, path.display().to_string())
            }
            ImageSource::Memory(image) => (image.clone(), "array".to_string()),
        };
        let (original_width, original_height) = original.dimensions();

        // Stage A
        let (processed, meta) = self.preprocessor.preprocess(&original);

        // Stage B
        let raw = self
            .detector
            .detect(&processed, self.config.confidence_threshold)?;
        debug!(detections = raw.len(), "detector returned raw detections");
        let mut routed = detect::route_detections(raw);

        // Stage D part 1: reconcile every box to original coordinates.
        for object in &mut routed.objects {
            let mapped = coords::to_original(&object.bounding_box, &meta);
            object.bounding_box = coords::clamp_to_image(&mapped, original_width, original_height);
        }
        for qr in &mut routed.qr_codes {
            let mapped = coords::to_original(&qr.bounding_box, &meta);
            qr.bounding_box = coords::clamp_to_image(&mapped, original_width, original_height);
        }

        // Stage C
        let run_qr_stage = self.config.enable_qr_detection && !routed.qr_codes.is_empty();
        let (qr_crops, ladder_results) = if run_qr_stage {
            let save_dir = (self.config.save_crops && opts.save_qr_crops)
                .then(|| self.config.qr_crops_dir.as_path());
            let qr_crops = crops::extract_qr_crops(&original, &routed.qr_codes, save_dir)?;

            let mut ladder_results: HashMap<String, Option<String>> = HashMap::new();
            for crop in &qr_crops {
                let gray = filters::to_gray(&crop.crop);
                let decoded = ladder::decode_with_strategies(&gray, self.decoder.as_ref(), &crop.qr_id);
                ladder_results.insert(crop.qr_id.clone(), decoded);
            }
            (qr_crops, ladder_results)
        } else {
            (Vec::new(), HashMap::new())
        };

        let direct_hits = if run_qr_stage {
            self.decoder.decode_all(&filters::to_gray(&original))
        } else {
            Vec::new()
        };

        // Stage D part 2: assembly.
        let detected_objects: Vec<DetectedObject> = routed
            .objects
            .iter()
            .map(|object| DetectedObject {
                object_id: object.object_id.clone(),
                class_name: object.class_name.clone(),
                confidence: round3(object.confidence),
                bounding_box: object.bounding_box,
            })
            .collect();

        let crops_by_id: HashMap<&str, &QrCrop> =
            qr_crops.iter().map(|c| (c.qr_id.as_str(), c)).collect();
        let qr_codes: Vec<QrCode> = routed
            .qr_codes
            .iter()
            .map(|hit| {
                self.assemble_qr(
                    hit,
                    crops_by_id.get(hit.qr_id.as_str()).copied(),
                    ladder_results.get(&hit.qr_id),
                    &direct_hits,
                )
            })
            .collect();

        let qr_crops_saved = qr_crops.iter().filter(|c| c.saved_path.is_some()).count();
        let qr_codes_decoded = qr_codes
            .iter()
            .filter(|qr| qr.content != PENDING_SCAN && qr.content != DECODE_FAILED)
            .count();

        let summary = Summary {
            total_detections: detected_objects.len() + qr_codes.len(),
            objects_count: detected_objects.len(),
            qr_codes_count: qr_codes.len(),
            classes_detected: routed.classes_detected.clone(),
            qr_crops_saved,
            qr_codes_decoded,
        };

        let processed_image = if self.config.save_processed_images {
            self.save_visualization(&original, &detected_objects, &qr_codes, &image_source)?
        } else {
            ProcessedImageInfo::not_saved()
        };

        let source_file_removed = self.maybe_remove_source(&source, opts);

        let result = ScanResult {
            scan_metadata: ScanMetadata {
                timestamp: Utc::now().to_rfc3339(),
                image_resolution: format!("{original_width}x{original_height}"),
                processing_time_ms: started.elapsed().as_millis() as u64,
                image_source,
                preprocessing: meta,
            },
            detected_objects,
            qr_codes,
            summary,
            processed_image,
            source_file_removed,
        };

        info!(
            objects = result.summary.objects_count,
            qr_codes = result.summary.qr_codes_count,
            elapsed_ms = result.scan_metadata.processing_time_ms,
            "pipeline run complete"
        );
        Ok(result)
    }

    /// Resolve a QR hit's content: crop-ladder result wins, then the
    /// position-matched direct decode, then the sentinels.
    fn assemble_qr(
        &self,
        hit: &QrHit,
        crop: Option<&QrCrop>,
        ladder_result: Option<&Option<String>>,
        direct_hits: &[DirectDecode],
    ) -> QrCode {
        let direct_match = direct_hits
            .iter()
            .find(|d| boxes_overlap(&d.bounding_box, &hit.bounding_box));

        let (content, decode_source) = match ladder_result {
            Some(Some(content)) => (content.clone(), DecodeSource::Crop),
            Some(None) => match direct_match {
                Some(direct) => (direct.content.clone(), DecodeSource::Direct),
                None => (DECODE_FAILED.to_string(), DecodeSource::None),
            },
            // Decode never attempted for this hit.
            None => match direct_match {
                Some(direct) => (direct.content.clone(), DecodeSource::Direct),
                None => (PENDING_SCAN.to_string(), DecodeSource::None),
            },
        };

        let decode_success = content != PENDING_SCAN && content != DECODE_FAILED;
        let crop_info = match crop {
            Some(crop) => CropInfo {
                saved: crop.saved_path.is_some(),
                path: crop
                    .saved_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
                size: Some(CropSize {
                    width: crop.size.width,
                    height: crop.size.height,
                }),
                decode_success: Some(decode_success),
            },
            None => CropInfo::not_saved(),
        };

        QrCode {
            qr_id: hit.qr_id.clone(),
            content,
            decode_source,
            position: Position {
                x: hit.bounding_box.x,
                y: hit.bounding_box.y,
            },
            confidence: round3(hit.confidence),
            bounding_box: hit.bounding_box,
            crop_info,
        }
    }

    /// Burn detection rectangles into a copy of the original image and
    /// write it under the processed-images directory.
    fn save_visualization(
        &self,
        original: &RgbImage,
        objects: &[DetectedObject],
        qr_codes: &[QrCode],
        image_source: &str,
    ) -> Result<ProcessedImageInfo, PipelineError> {
        let mut annotated = original.clone();
        for object in objects {
            draw_box(&mut annotated, &object.bounding_box, Rgb([0, 255, 0]));
        }
        for qr in qr_codes {
            draw_box(&mut annotated, &qr.bounding_box, Rgb([255, 0, 0]));
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let filename = if image_source != "array" {
            let stem = Path::new(image_source)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string());
            format!("{stem}_processed_{timestamp}.jpg")
        } else {
            format!("processed_image_{timestamp}.jpg")
        };

        std::fs::create_dir_all(&self.config.processed_images_dir)?;
        let path = self.config.processed_images_dir.join(&filename);
        annotated.save(&path)?;
        debug!(path = %path.display(), "saved annotated image");

        Ok(ProcessedImageInfo {
            saved: true,
            path: Some(path.display().to_string()),
            filename: Some(filename),
        })
    }

    fn maybe_remove_source(&self, source: &ImageSource, opts: &ProcessOptions) -> bool {
        let ImageSource::Path(path) = source else {
            return false;
        };
        if !opts.remove_source_file || !path.exists() {
            return false;
        }
        match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(err) => {
                error!(path = %path.display(), error = %err, "failed to remove source file");
                false
            }
        }
    }
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

/// Strict-positive intersection test between two boxes.
fn boxes_overlap(a: &BoundingBox, b: &BoundingBox) -> bool {
    let x_overlap = a.x < b.x + b.width && b.x < a.x + a.width;
    let y_overlap = a.y < b.y + b.height && b.y < a.y + a.height;
    x_overlap && y_overlap
}

/// 2-pixel rectangle border, clipped to the image.
fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    let x1 = bbox.x.clamp(0, width as i64 - 1);
    let y1 = bbox.y.clamp(0, height as i64 - 1);
    let x2 = (bbox.x + bbox.width).clamp(0, width as i64 - 1);
    let y2 = (bbox.y + bbox.height).clamp(0, height as i64 - 1);

    for thickness in 0..2i64 {
        for x in x1..=x2 {
            for &y in &[y1 + thickness, y2 - thickness] {
                if (0..height as i64).contains(&y) {
                    image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
        for y in y1..=y2 {
            for &x in &[x1 + thickness, x2 - thickness] {
                if (0..width as i64).contains(&x) {
                    image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}
