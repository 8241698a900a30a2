//! Grayscale transforms backing the QR decode strategy ladder.
//!
//! The `image` crate covers resize, blur, 3×3 convolution and rotation;
//! the threshold family (Otsu, Gaussian-adaptive) and the 3×3 median are
//! implemented here directly on `GrayImage` buffers.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

/// Convert an RGB buffer to grayscale using the standard luma weights.
pub fn to_gray(image: &RgbImage) -> GrayImage {
    imageops::grayscale(image)
}

/// Compute the Otsu threshold level of a grayscale image.
///
/// Maximizes between-class variance over the 256-bin histogram.
pub fn otsu_level(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }

    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;
    let mut best_level = 0u8;
    let mut best_variance = f64::MIN;

    for level in 0..256usize {
        background_count += histogram[level];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }

        background_sum += level as f64 * histogram[level] as f64;
        let mean_background = background_sum / background_count as f64;
        let mean_foreground = (weighted_sum - background_sum) / foreground_count as f64;

        let variance = background_count as f64
            * foreground_count as f64
            * (mean_background - mean_foreground).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }

    best_level
}

/// Binarize with a fixed level: values above the level become white.
pub fn binarize(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
    }
    out
}

/// Otsu-threshold an image in one step.
pub fn otsu_binarize(image: &GrayImage) -> GrayImage {
    binarize(image, otsu_level(image))
}

/// Gaussian-weighted adaptive threshold.
///
/// Each pixel is compared against the Gaussian mean of its `block`-sized
/// neighborhood minus `offset`; the canonical ladder step uses an 11×11
/// block with offset 2.
pub fn adaptive_threshold_gaussian(image: &GrayImage, block: u32, offset: f64) -> GrayImage {
    let radius = (block / 2) as i64;
    // Matches the usual sigma heuristic for an auto-sized Gaussian kernel.
    let sigma = 0.3 * ((block as f64 - 1.0) * 0.5 - 1.0) + 0.8;

    let mut kernel = Vec::with_capacity(block as usize);
    let mut kernel_sum = 0.0;
    for i in 0..block as i64 {
        let distance = (i - radius) as f64;
        let weight = (-(distance * distance) / (2.0 * sigma * sigma)).exp();
        kernel.push(weight);
        kernel_sum += weight;
    }
    for weight in &mut kernel {
        *weight /= kernel_sum;
    }

    let (width, height) = image.dimensions();
    let clamp_x = |x: i64| x.clamp(0, width as i64 - 1) as u32;
    let clamp_y = |y: i64| y.clamp(0, height as i64 - 1) as u32;

    // Separable pass: horizontal then vertical.
    let mut horizontal = vec![0.0f64; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sample_x = clamp_x(x as i64 + k as i64 - radius);
                acc += weight * image.get_pixel(sample_x, y).0[0] as f64;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut mean = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sample_y = clamp_y(y as i64 + k as i64 - radius);
                mean += weight * horizontal[(sample_y * width + x) as usize];
            }
            let value = image.get_pixel(x, y).0[0] as f64;
            out.put_pixel(
                x,
                y,
                Luma([if value > mean - offset { 255 } else { 0 }]),
            );
        }
    }
    out
}

/// 3×3 median blur with edge clamping.
pub fn median_blur3(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    let mut window = [0u8; 9];

    for y in 0..height {
        for x in 0..width {
            let mut n = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sample_x = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                    let sample_y = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                    window[n] = image.get_pixel(sample_x, sample_y).0[0];
                    n += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }
    out
}

/// 3×3 sharpening convolution (center 9, neighbors -1).
pub fn sharpen3x3(image: &GrayImage) -> GrayImage {
    #[rustfmt::skip]
    let kernel = [
        -1.0, -1.0, -1.0,
        -1.0,  9.0, -1.0,
        -1.0, -1.0, -1.0,
    ];
    imageops::filter3x3(image, &kernel)
}

/// Bicubic upscale by `factor`.
pub fn upscale(image: &GrayImage, factor: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    imageops::resize(
        image,
        ((width as f64) * factor) as u32,
        ((height as f64) * factor) as u32,
        FilterType::CatmullRom,
    )
}

/// 5×5-equivalent Gaussian blur.
pub fn gaussian_blur5(image: &GrayImage) -> GrayImage {
    imageops::blur(image, 1.1)
}

/// Bitwise inversion.
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    imageops::invert(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal_image() -> GrayImage {
        // Left half dark (40), right half bright (200).
        let mut image = GrayImage::new(20, 10);
        for y in 0..10 {
            for x in 0..20 {
                image.put_pixel(x, y, Luma([if x < 10 { 40 } else { 200 }]));
            }
        }
        image
    }

    #[test]
    fn test_otsu_separates_bimodal_histogram() {
        let level = otsu_level(&bimodal_image());
        assert!(level >= 40 && level < 200, "level was {level}");

        let binary = otsu_binarize(&bimodal_image());
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(19, 0).0[0], 255);
    }

    #[test]
    fn test_otsu_uniform_image() {
        let image = GrayImage::from_pixel(8, 8, Luma([128]));
        // No crash and a defined level for a single-mode histogram.
        let _ = otsu_level(&image);
    }

    #[test]
    fn test_binarize_threshold_semantics() {
        let image = GrayImage::from_pixel(1, 1, Luma([100]));
        assert_eq!(binarize(&image, 100).get_pixel(0, 0).0[0], 0);
        assert_eq!(binarize(&image, 99).get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn test_median_removes_salt_noise() {
        let mut image = GrayImage::from_pixel(9, 9, Luma([0]));
        image.put_pixel(4, 4, Luma([255]));
        let blurred = median_blur3(&image);
        assert_eq!(blurred.get_pixel(4, 4).0[0], 0);
    }

    #[test]
    fn test_adaptive_threshold_output_is_binary() {
        let out = adaptive_threshold_gaussian(&bimodal_image(), 11, 2.0);
        for pixel in out.pixels() {
            assert!(pixel.0[0] == 0 || pixel.0[0] == 255);
        }
    }

    #[test]
    fn test_upscale_dimensions() {
        let image = GrayImage::new(10, 20);
        let doubled = upscale(&image, 2.0);
        assert_eq!(doubled.dimensions(), (20, 40));
        let one_and_half = upscale(&image, 1.5);
        assert_eq!(one_and_half.dimensions(), (15, 30));
    }

    #[test]
    fn test_invert_round_trips() {
        let image = bimodal_image();
        let twice = invert(&invert(&image));
        assert_eq!(image.as_raw(), twice.as_raw());
    }
}
