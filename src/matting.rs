//! Trimap-based alpha-matting edge refinement
//!
//! Sharpens mask edges the way the upstream alpha-matting option does:
//! pixels confidently foreground or background (after erosion) snap to
//! fully opaque or fully transparent, and only the unknown band between
//! them keeps soft alpha, smoothed with a small gaussian blur.

use crate::config::AlphaMattingConfig;
use crate::types::SegmentationMask;
use image::GrayImage;

/// Refine a segmentation mask using trimap-based matting
///
/// Returns a new mask with the same dimensions. Masks with zero area are
/// returned unchanged.
#[must_use]
pub fn refine_mask(mask: &SegmentationMask, config: &AlphaMattingConfig) -> SegmentationMask {
    let (width, height) = mask.dimensions;
    if width == 0 || height == 0 || mask.data.is_empty() {
        return mask.clone();
    }

    // Binary confidence maps before erosion
    let foreground: Vec<bool> = mask
        .data
        .iter()
        .map(|&v| v >= config.foreground_threshold)
        .collect();
    let background: Vec<bool> = mask
        .data
        .iter()
        .map(|&v| v <= config.background_threshold)
        .collect();

    let confident_fg = erode(&foreground, width, height, config.erode_size);
    let confident_bg = erode(&background, width, height, config.erode_size);

    // Soft alpha for the unknown band
    let gray = GrayImage::from_raw(width, height, mask.data.clone())
        .unwrap_or_else(|| GrayImage::new(width, height));
    let blurred = image::imageops::blur(&gray, 2.0);

    let mut refined = Vec::with_capacity(mask.data.len());
    for i in 0..mask.data.len() {
        let value = if confident_fg[i] {
            255
        } else if confident_bg[i] {
            0
        } else {
            blurred.as_raw().get(i).copied().unwrap_or(0)
        };
        refined.push(value);
    }

    SegmentationMask::new(refined, mask.dimensions)
}

/// Binary erosion with a square structuring element, done as two
/// separable min passes
fn erode(input: &[bool], width: u32, height: u32, radius: u32) -> Vec<bool> {
    if radius == 0 {
        return input.to_vec();
    }
    let w = width as usize;
    let h = height as usize;
    let r = radius as usize;

    // Horizontal pass
    let mut horizontal = vec![false; input.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(r);
            let hi = (x + r).min(w - 1);
            horizontal[y * w + x] = (lo..=hi).all(|xx| input[y * w + xx]);
        }
    }

    // Vertical pass
    let mut output = vec![false; input.len()];
    for y in 0..h {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(h - 1);
        for x in 0..w {
            output[y * w + x] = (lo..=hi).all(|yy| horizontal[yy * w + x]);
        }
    }

    output
}
