//! Stage C: the QR decode strategy ladder.
//!
//! An ordered sequence of image transforms, each followed by a decode
//! attempt; the first success wins and later strategies never run. The
//! strategies are mutually exclusive, not combined.

use crate::decoder::SymbolDecoder;
use crate::filters;
use image::{imageops, GrayImage};
use tracing::{debug, warn};

/// Run the canonical strategy ladder over a grayscale crop.
///
/// Order:
/// 1. raw grayscale
/// 2. adaptive threshold (Gaussian, 11×11, C=2)
/// 3. median denoise then Otsu
/// 4. sharpen then Otsu
/// 5. upscale ×1.5 / ×2.0 (bicubic), Otsu on each
/// 6. Gaussian blur then Otsu, plus the inverse of that Otsu
/// 7. Otsu then 90°/180°/270° rotations
///
/// Returns `None` when every attempt fails; the caller maps that to the
/// `DECODE_FAILED` sentinel.
pub fn decode_with_strategies(
    gray: &GrayImage,
    decoder: &dyn SymbolDecoder,
    qr_id: &str,
) -> Option<String> {
    debug!(
        qr_id,
        width = gray.width(),
        height = gray.height(),
        "running decode ladder"
    );

    if let Some(content) = decoder.decode(gray) {
        return Some(content);
    }

    if let Some(content) = decoder.decode(&filters::adaptive_threshold_gaussian(gray, 11, 2.0)) {
        return Some(content);
    }

    if let Some(content) = decoder.decode(&filters::otsu_binarize(&filters::median_blur3(gray))) {
        return Some(content);
    }

    if let Some(content) = decoder.decode(&filters::otsu_binarize(&filters::sharpen3x3(gray))) {
        return Some(content);
    }

    for factor in [1.5, 2.0] {
        let scaled = filters::upscale(gray, factor);
        if let Some(content) = decoder.decode(&filters::otsu_binarize(&scaled)) {
            return Some(content);
        }
    }

    let blurred_otsu = filters::otsu_binarize(&filters::gaussian_blur5(gray));
    if let Some(content) = decoder.decode(&blurred_otsu) {
        return Some(content);
    }
    if let Some(content) = decoder.decode(&filters::invert(&blurred_otsu)) {
        return Some(content);
    }

    let binary = filters::otsu_binarize(gray);
    let rotations: [GrayImage; 3] = [
        imageops::rotate90(&binary),
        imageops::rotate180(&binary),
        imageops::rotate270(&binary),
    ];
    for rotated in &rotations {
        if let Some(content) = decoder.decode(rotated) {
            return Some(content);
        }
    }

    warn!(qr_id, "no decode strategy succeeded");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testing::{FnDecoder, NeverDecoder};
    use image::Luma;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gradient_crop() -> GrayImage {
        // Non-trivial histogram so Otsu produces both classes.
        GrayImage::from_fn(16, 16, |x, _| Luma([(x * 16) as u8]))
    }

    #[test]
    fn test_first_success_wins() {
        let attempts = AtomicUsize::new(0);
        let decoder = FnDecoder(|_: &GrayImage| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Some("FIRST".to_string())
        });

        let content = decode_with_strategies(&gradient_crop(), &decoder, "QR_test");
        assert_eq!(content.as_deref(), Some("FIRST"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_strategies_fail() {
        assert!(decode_with_strategies(&gradient_crop(), &NeverDecoder, "QR_test").is_none());
    }

    #[test]
    fn test_ladder_reaches_binarized_strategies() {
        // Succeed only once the buffer is strictly binary, which the raw
        // gradient is not: proves the ladder advances past strategy 1.
        let decoder = FnDecoder(|gray: &GrayImage| {
            let binary = gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255);
            binary.then(|| "BINARIZED".to_string())
        });

        let content = decode_with_strategies(&gradient_crop(), &decoder, "QR_test");
        assert_eq!(content.as_deref(), Some("BINARIZED"));
    }

    #[test]
    fn test_ladder_reaches_upscaled_strategies() {
        // Succeed only on a buffer wider than the input crop.
        let decoder = FnDecoder(|gray: &GrayImage| (gray.width() > 16).then(|| "BIG".to_string()));

        let content = decode_with_strategies(&gradient_crop(), &decoder, "QR_test");
        assert_eq!(content.as_deref(), Some("BIG"));
    }

    #[test]
    fn test_ladder_reaches_rotations() {
        // A tall buffer only appears once the (wide) crop is rotated 90°,
        // and upscaling preserves aspect ratio, so this isolates step 7.
        let wide = GrayImage::from_fn(32, 8, |x, _| Luma([(x * 8) as u8]));
        let decoder =
            FnDecoder(|gray: &GrayImage| (gray.height() > gray.width()).then(|| "ROT".to_string()));

        let content = decode_with_strategies(&wide, &decoder, "QR_test");
        assert_eq!(content.as_deref(), Some("ROT"));
    }

    #[test]
    fn test_one_pixel_crop_fails_cleanly() {
        let tiny = GrayImage::new(1, 1);
        assert!(decode_with_strategies(&tiny, &NeverDecoder, "QR_tiny").is_none());
    }
}
