//! Deterministic preprocessing variants for one candidate crop.
//!
//! Plate lighting and glare vary widely between gates, so several cheap
//! transforms are tried against each crop instead of one adaptive pass. The
//! order is significant: the arbiter iterates variants front to back and a
//! high-scoring early hypothesis can short-circuit the rest of the work.

use common::plates::ProcessedImage;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use imageproc::contrast::{adaptive_threshold, equalize_histogram, otsu_level, threshold, ThresholdType};
use imageproc::filter::median_filter;

/// Crops smaller than this on their larger side are upscaled before the
/// ensemble runs; OCR accuracy collapses on tiny plate crops.
pub const DEFAULT_MIN_CROP_DIM: u32 = 200;

/// Upscale a crop so its larger dimension reaches `min_dim`, preserving
/// aspect ratio. Crops already large enough pass through untouched.
pub fn upscale(crop: RgbImage, min_dim: u32) -> RgbImage {
    let (w, h) = (crop.width(), crop.height());
    let max_side = w.max(h);
    if max_side == 0 || max_side >= min_dim {
        return crop;
    }
    let scale = min_dim as f32 / max_side as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    image::imageops::resize(&crop, nw, nh, FilterType::CatmullRom)
}

/// Produce the ordered variant set for one crop.
///
/// Every transform is total: a crop that cannot be processed (degenerate
/// dimensions) yields an empty set rather than an error, and no variant can
/// abort the ensemble.
pub fn expand(crop: &RgbImage) -> Vec<ProcessedImage> {
    if crop.width() == 0 || crop.height() == 0 {
        return Vec::new();
    }

    let gray = image::imageops::grayscale(crop);
    let otsu = otsu_level(&gray);
    // Block radius for the local threshold, bounded by the crop size
    let block_radius = (crop.width().min(crop.height()) / 8).clamp(1, 16);

    let mut variants = Vec::with_capacity(5);
    variants.push(ProcessedImage {
        name: "original",
        image: DynamicImage::ImageRgb8(crop.clone()),
    });
    variants.push(ProcessedImage {
        name: "gray-otsu",
        image: DynamicImage::ImageLuma8(threshold(&gray, otsu, ThresholdType::Binary)),
    });
    variants.push(ProcessedImage {
        name: "adaptive-threshold",
        image: DynamicImage::ImageLuma8(adaptive_threshold(&gray, block_radius)),
    });
    variants.push(ProcessedImage {
        name: "equalized",
        image: DynamicImage::ImageLuma8(equalize_histogram(&gray)),
    });
    let smoothed = median_filter(&gray, 1, 1);
    variants.push(ProcessedImage {
        name: "median-otsu",
        image: DynamicImage::ImageLuma8(threshold(
            &smoothed,
            otsu_level(&smoothed),
            ThresholdType::Binary,
        )),
    });
    variants
}
