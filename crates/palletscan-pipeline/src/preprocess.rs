//! Stage A: image loading and letterbox preprocessing.
//!
//! Detectors expect a fixed square input; the preprocessor resizes while
//! preserving aspect ratio and pads the remainder with black. The returned
//! metadata is what stage D uses to project coordinates back onto the
//! original image.

use crate::config::PreprocessConfig;
use crate::error::PipelineError;
use crate::types::PreprocessMeta;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::Path;
use tracing::debug;

/// Stage-A preprocessor. Minimal mode resizes and pads only; enhanced mode
/// applies a gamma boost first.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Load an image from disk into an RGB buffer.
    ///
    /// A missing path maps to `ImageNotFound`; undecodable bytes map to
    /// `ImageDecode`.
    pub fn load_image(path: &Path) -> Result<RgbImage, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::ImageNotFound(path.display().to_string()));
        }
        let image = image::open(path)?;
        Ok(image.to_rgb8())
    }

    /// Run the full stage-A pipeline on an already-loaded buffer.
    pub fn preprocess(&self, image: &RgbImage) -> (RgbImage, PreprocessMeta) {
        let input = if self.config.enhance_contrast {
            gamma_boost(image, 1.2)
        } else {
            image.clone()
        };
        self.letterbox(&input)
    }

    /// Resize preserving aspect ratio, centered on a black square canvas.
    fn letterbox(&self, image: &RgbImage) -> (RgbImage, PreprocessMeta) {
        let target = self.config.target_size;
        let (width, height) = image.dimensions();

        let scale = f64::min(
            target as f64 / width as f64,
            target as f64 / height as f64,
        );
        let new_width = ((width as f64) * scale) as u32;
        let new_height = ((height as f64) * scale) as u32;

        let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);

        let x_offset = ((target - new_width) / 2) as i64;
        let y_offset = ((target - new_height) / 2) as i64;

        // Black canvas; ImageBuffer::new zero-fills.
        let mut padded = RgbImage::new(target, target);
        imageops::replace(&mut padded, &resized, x_offset, y_offset);

        debug!(
            original = %format!("{}x{}", width, height),
            scale,
            x_offset,
            y_offset,
            "letterboxed image"
        );

        let meta = PreprocessMeta {
            scale_factor: scale,
            target_size: target,
            original_width: width,
            original_height: height,
            x_offset,
            y_offset,
        };
        (padded, meta)
    }
}

/// Gentle contrast boost via a gamma lookup table.
fn gamma_boost(image: &RgbImage, gamma: f64) -> RgbImage {
    let inverse = 1.0 / gamma;
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let normalized = value as f64 / 255.0;
        *slot = (normalized.powf(inverse) * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    let mut boosted = image.clone();
    for pixel in boosted.pixels_mut() {
        pixel.0 = [lut[pixel.0[0] as usize], lut[pixel.0[1] as usize], lut[pixel.0[2] as usize]];
    }
    boosted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(PreprocessConfig::default())
    }

    #[test]
    fn test_letterbox_landscape_dimensions_and_offsets() {
        let image = RgbImage::new(320, 240);
        let (processed, meta) = preprocessor().preprocess(&image);

        assert_eq!(processed.dimensions(), (640, 640));
        assert_eq!(meta.scale_factor, 2.0);
        assert_eq!(meta.x_offset, 0);
        // 240 * 2 = 480 tall, centered in 640
        assert_eq!(meta.y_offset, 80);
        assert_eq!(meta.original_width, 320);
        assert_eq!(meta.original_height, 240);
    }

    #[test]
    fn test_letterbox_portrait_pads_horizontally() {
        let image = RgbImage::new(100, 400);
        let (_, meta) = preprocessor().preprocess(&image);

        assert_eq!(meta.scale_factor, 1.6);
        assert_eq!(meta.y_offset, 0);
        assert_eq!(meta.x_offset, (640 - 160) / 2);
    }

    #[test]
    fn test_letterbox_padding_is_black() {
        let mut image = RgbImage::new(320, 240);
        for pixel in image.pixels_mut() {
            pixel.0 = [255, 255, 255];
        }
        let (processed, meta) = preprocessor().preprocess(&image);

        // Above the content band everything is padding.
        assert_eq!(processed.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(
            processed.get_pixel(320, meta.y_offset as u32).0,
            [255, 255, 255]
        );
    }

    #[test]
    fn test_load_image_missing_path() {
        let err = Preprocessor::load_image(Path::new("/nonexistent/image.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::ImageNotFound(_)));
        assert!(err.to_string().contains("Imagem não encontrada"));
    }

    #[test]
    fn test_gamma_boost_brightens_midtones() {
        let mut image = RgbImage::new(1, 1);
        image.get_pixel_mut(0, 0).0 = [128, 128, 128];
        let boosted = gamma_boost(&image, 1.2);
        assert!(boosted.get_pixel(0, 0).0[0] > 128);
        // Endpoints are fixed points.
        let mut extremes = RgbImage::new(2, 1);
        extremes.get_pixel_mut(0, 0).0 = [0, 0, 0];
        extremes.get_pixel_mut(1, 0).0 = [255, 255, 255];
        let boosted = gamma_boost(&extremes, 1.2);
        assert_eq!(boosted.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(boosted.get_pixel(1, 0).0, [255, 255, 255]);
    }
}
