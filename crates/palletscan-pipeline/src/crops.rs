//! QR crop extraction from the original image.

use crate::detect::QrHit;
use crate::error::PipelineError;
use crate::types::{CropSize, Position};
use image::imageops;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pixel margin added around each QR bounding box before cropping.
pub const CROP_MARGIN: i64 = 5;

/// One extracted QR crop, optionally persisted to disk.
#[derive(Debug, Clone)]
pub struct QrCrop {
    pub qr_id: String,
    pub crop: RgbImage,
    pub position: Position,
    pub size: CropSize,
    pub saved_path: Option<PathBuf>,
}

/// Crop every QR detection out of the original image with a small margin,
/// clamped to image bounds. When `save_dir` is given, each crop is written
/// as `{qr_id}_crop.jpg`.
pub fn extract_qr_crops(
    original: &RgbImage,
    qr_hits: &[QrHit],
    save_dir: Option<&Path>,
) -> Result<Vec<QrCrop>, PipelineError> {
    let (image_width, image_height) = original.dimensions();
    let mut crops = Vec::with_capacity(qr_hits.len());

    if let Some(dir) = save_dir {
        std::fs::create_dir_all(dir)?;
    }

    for hit in qr_hits {
        let bbox = &hit.bounding_box;
        let x1 = (bbox.x - CROP_MARGIN).max(0);
        let y1 = (bbox.y - CROP_MARGIN).max(0);
        let x2 = (bbox.x + bbox.width + CROP_MARGIN).min(image_width as i64);
        let y2 = (bbox.y + bbox.height + CROP_MARGIN).min(image_height as i64);

        let crop_width = ((x2 - x1).max(1)) as u32;
        let crop_height = ((y2 - y1).max(1)) as u32;
        let crop = imageops::crop_imm(original, x1 as u32, y1 as u32, crop_width, crop_height)
            .to_image();

        let saved_path = match save_dir {
            Some(dir) => {
                let path = dir.join(format!("{}_crop.jpg", hit.qr_id));
                crop.save(&path)?;
                debug!(qr_id = %hit.qr_id, path = %path.display(), "saved qr crop");
                Some(path)
            }
            None => None,
        };

        crops.push(QrCrop {
            qr_id: hit.qr_id.clone(),
            crop,
            position: Position { x: x1, y: y1 },
            size: CropSize {
                width: crop_width as i64,
                height: crop_height as i64,
            },
            saved_path,
        });
    }

    Ok(crops)
}
