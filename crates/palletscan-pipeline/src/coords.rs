//! Stage D: coordinate reconciliation between processed and original
//! image space.

use crate::types::{BoundingBox, PreprocessMeta};

/// Map a bounding box from letterboxed coordinates back to the original
/// image: remove padding offsets, undo the scale, then clamp to the
/// original bounds.
pub fn to_original(bbox: &BoundingBox, meta: &PreprocessMeta) -> BoundingBox {
    // Extent of the actual image content inside the letterbox.
    let content_width = ((meta.original_width as f64) * meta.scale_factor) as i64;
    let content_height = ((meta.original_height as f64) * meta.scale_factor) as i64;

    let x_unpadded = (bbox.x - meta.x_offset).clamp(0, content_width);
    let y_unpadded = (bbox.y - meta.y_offset).clamp(0, content_height);
    let x2_unpadded = (x_unpadded + bbox.width).min(content_width);
    let y2_unpadded = (y_unpadded + bbox.height).min(content_height);

    let orig_w = meta.original_width as i64;
    let orig_h = meta.original_height as i64;

    let x = (((x_unpadded as f64) / meta.scale_factor) as i64).clamp(0, orig_w);
    let y = (((y_unpadded as f64) / meta.scale_factor) as i64).clamp(0, orig_h);
    let width = (((x2_unpadded - x_unpadded) as f64) / meta.scale_factor) as i64;
    let height = (((y2_unpadded - y_unpadded) as f64) / meta.scale_factor) as i64;

    BoundingBox {
        x,
        y,
        width: width.min(orig_w - x),
        height: height.min(orig_h - y),
    }
}

/// Project a bounding box from original coordinates into letterboxed
/// space. Inverse of [`to_original`] within rounding.
pub fn to_processed(bbox: &BoundingBox, meta: &PreprocessMeta) -> BoundingBox {
    BoundingBox {
        x: ((bbox.x as f64) * meta.scale_factor) as i64 + meta.x_offset,
        y: ((bbox.y as f64) * meta.scale_factor) as i64 + meta.y_offset,
        width: ((bbox.width as f64) * meta.scale_factor) as i64,
        height: ((bbox.height as f64) * meta.scale_factor) as i64,
    }
}

/// Clamp a bounding box into `[0, W) × [0, H)` with a minimum size of
/// 1×1. Every reported box passes through here last.
pub fn clamp_to_image(bbox: &BoundingBox, width: u32, height: u32) -> BoundingBox {
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    let x = bbox.x.clamp(0, max_x.max(0));
    let y = bbox.y.clamp(0, max_y.max(0));

    let clamped_width = bbox.width.min(width as i64 - x).max(1);
    let clamped_height = bbox.height.min(height as i64 - y).max(1);

    BoundingBox {
        x,
        y,
        width: clamped_width,
        height: clamped_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_320x240() -> PreprocessMeta {
        // 320x240 letterboxed into 640: scale 2.0, vertical padding 80.
        PreprocessMeta {
            scale_factor: 2.0,
            target_size: 640,
            original_width: 320,
            original_height: 240,
            x_offset: 0,
            y_offset: 80,
        }
    }

    #[test]
    fn test_to_original_removes_offset_and_scale() {
        let meta = meta_320x240();
        let processed = BoundingBox::new(200, 280, 400, 300);
        let original = to_original(&processed, &meta);
        assert_eq!(original, BoundingBox::new(100, 100, 200, 150));
    }

    #[test]
    fn test_to_original_clamps_into_content_region() {
        let meta = meta_320x240();
        // Box starting inside the top padding band.
        let processed = BoundingBox::new(10, 0, 50, 200);
        let original = to_original(&processed, &meta);
        assert_eq!(original.y, 0);
        assert!(original.y + original.height <= 240);
    }

    #[test]
    fn test_round_trip_within_one_pixel() {
        let metas = [
            meta_320x240(),
            PreprocessMeta {
                scale_factor: 640.0 / 1000.0,
                target_size: 640,
                original_width: 1000,
                original_height: 750,
                x_offset: 0,
                y_offset: (640 - 480) / 2,
            },
        ];
        let boxes = [
            BoundingBox::new(100, 100, 200, 150),
            BoundingBox::new(0, 0, 50, 50),
            BoundingBox::new(33, 71, 97, 13),
        ];

        for meta in &metas {
            for bbox in &boxes {
                let projected = to_processed(bbox, meta);
                let back = to_original(&projected, meta);
                assert!((bbox.x - back.x).abs() <= 1, "{bbox:?} vs {back:?}");
                assert!((bbox.y - back.y).abs() <= 1, "{bbox:?} vs {back:?}");
                assert!((bbox.width - back.width).abs() <= 1, "{bbox:?} vs {back:?}");
                assert!(
                    (bbox.height - back.height).abs() <= 1,
                    "{bbox:?} vs {back:?}"
                );
            }
        }
    }

    #[test]
    fn test_clamp_enforces_bounds_and_minimum_size() {
        let clamped = clamp_to_image(&BoundingBox::new(-5, -5, 4, 4), 100, 100);
        assert_eq!(clamped.x, 0);
        assert_eq!(clamped.y, 0);

        let clamped = clamp_to_image(&BoundingBox::new(99, 99, 50, 50), 100, 100);
        assert_eq!(clamped, BoundingBox::new(99, 99, 1, 1));

        let clamped = clamp_to_image(&BoundingBox::new(10, 10, 0, 0), 100, 100);
        assert_eq!(clamped.width, 1);
        assert_eq!(clamped.height, 1);
    }

    #[test]
    fn test_clamped_box_satisfies_invariants() {
        let (width, height) = (320u32, 240u32);
        let candidates = [
            BoundingBox::new(-10, 5, 400, 10),
            BoundingBox::new(319, 239, 3, 3),
            BoundingBox::new(0, 0, 320, 240),
        ];
        for bbox in &candidates {
            let clamped = clamp_to_image(bbox, width, height);
            assert!(clamped.x >= 0 && clamped.y >= 0);
            assert!(clamped.x + clamped.width <= width as i64);
            assert!(clamped.y + clamped.height <= height as i64);
        }
    }
}
