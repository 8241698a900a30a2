//! QR symbol decoding interface.
//!
//! Symbol decoding proper is an external collaborator; the pipeline only
//! consumes [`SymbolDecoder`]. The default backend is `rqrr`, reached
//! through its greyscale-closure API so no image types cross the boundary.

use crate::types::BoundingBox;
use image::GrayImage;
use tracing::trace;

/// A decode hit from the full-image pass, with the symbol's location.
#[derive(Debug, Clone)]
pub struct DirectDecode {
    pub content: String,
    pub bounding_box: BoundingBox,
}

/// Decodes QR symbols out of grayscale buffers.
pub trait SymbolDecoder: Send + Sync {
    /// Attempt to decode a single symbol. Returns the first non-empty
    /// payload found, if any.
    fn decode(&self, gray: &GrayImage) -> Option<String>;

    /// Decode every symbol in the buffer, reporting positions. Used for
    /// the full-image fallback pass.
    fn decode_all(&self, gray: &GrayImage) -> Vec<DirectDecode> {
        match self.decode(gray) {
            Some(content) => vec![DirectDecode {
                content,
                bounding_box: BoundingBox::new(
                    0,
                    0,
                    gray.width() as i64,
                    gray.height() as i64,
                ),
            }],
            None => Vec::new(),
        }
    }
}

/// Default decoder backend.
#[derive(Debug, Clone, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }

    fn grids(gray: &GrayImage) -> Vec<(String, BoundingBox)> {
        if gray.width() == 0 || gray.height() == 0 {
            return Vec::new();
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32).0[0],
        );

        let mut hits = Vec::new();
        for grid in prepared.detect_grids() {
            let bounds = grid.bounds;
            match grid.decode() {
                Ok((_, content)) if !content.is_empty() => {
                    let min_x = bounds.iter().map(|p| p.x as i64).min().unwrap_or(0);
                    let min_y = bounds.iter().map(|p| p.y as i64).min().unwrap_or(0);
                    let max_x = bounds.iter().map(|p| p.x as i64).max().unwrap_or(0);
                    let max_y = bounds.iter().map(|p| p.y as i64).max().unwrap_or(0);
                    hits.push((
                        content,
                        BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y),
                    ));
                }
                Ok(_) => {}
                Err(err) => {
                    trace!(error = %err, "grid decode attempt failed");
                }
            }
        }
        hits
    }
}

impl SymbolDecoder for RqrrDecoder {
    fn decode(&self, gray: &GrayImage) -> Option<String> {
        Self::grids(gray).into_iter().map(|(content, _)| content).next()
    }

    fn decode_all(&self, gray: &GrayImage) -> Vec<DirectDecode> {
        Self::grids(gray)
            .into_iter()
            .map(|(content, bounding_box)| DirectDecode {
                content,
                bounding_box,
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rqrr_handles_blank_image() {
        let decoder = RqrrDecoder::new();
        let blank = GrayImage::new(64, 64);
        assert!(decoder.decode(&blank).is_none());
        assert!(decoder.decode_all(&blank).is_empty());
    }

    #[test]
    fn test_rqrr_handles_degenerate_crop() {
        let decoder = RqrrDecoder::new();
        let tiny = GrayImage::new(1, 1);
        assert!(decoder.decode(&tiny).is_none());
    }

    #[test]
    fn test_default_decode_all_reports_full_image_bounds() {
        let decoder = testing::FnDecoder(|_: &GrayImage| Some("PAYLOAD".to_string()));
        let hits = decoder.decode_all(&GrayImage::new(30, 40));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bounding_box.width, 30);
        assert_eq!(hits[0].bounding_box.height, 40);
    }
}
