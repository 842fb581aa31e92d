//! Image preprocessing for model inference
//!
//! Converts an arbitrary input image into the square normalized NCHW
//! tensor the segmentation networks expect: RGB conversion, aspect ratio
//! preserving resize, center padding, per-channel normalization.

use crate::{
    error::{RemovalError, Result},
    models::PreprocessingConfig,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Padding color for the centered canvas (white, matches training data)
const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image into an inference-ready tensor
    ///
    /// # Errors
    /// - Calculated dimensions out of valid range
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let target_size = preprocessing_config.target_size[0];

        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Err(RemovalError::processing("Input image has zero dimensions"));
        }

        let (new_width, new_height) = scaled_dimensions((orig_width, orig_height), target_size);

        let resized = image::imageops::resize(
            &rgb_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        let mut canvas = ImageBuffer::from_pixel(
            target_size,
            target_size,
            image::Rgb(PADDING_COLOR),
        );

        let offset_x = (target_size - new_width) / 2;
        let offset_y = (target_size - new_height) / 2;
        for (x, y, pixel) in resized.enumerate_pixels() {
            let canvas_x = x + offset_x;
            let canvas_y = y + offset_y;
            if canvas_x < target_size && canvas_y < target_size {
                canvas.put_pixel(canvas_x, canvas_y, *pixel);
            }
        }

        let target_size_usize = usize::try_from(target_size)
            .map_err(|_| RemovalError::processing("Target size too large for tensor allocation"))?;

        Ok(Self::canvas_to_tensor(
            &canvas,
            preprocessing_config,
            target_size_usize,
        ))
    }

    /// Convert the padded canvas to a normalized NCHW tensor
    fn canvas_to_tensor(
        canvas: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
        target_size: usize,
    ) -> Array4<f32> {
        let mut tensor = Array4::<f32>::zeros((1, 3, target_size, target_size));

        #[allow(clippy::indexing_slicing)]
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for channel in 0..3 {
                    let normalized = (f32::from(pixel[channel]) / 255.0
                        - preprocessing_config.normalization_mean[channel])
                        / preprocessing_config.normalization_std[channel];
                    tensor[[0, channel, y, x]] = normalized;
                }
            }
        }

        tensor
    }
}

/// Aspect ratio preserving dimensions for a square target
///
/// Used both during preprocessing and when mapping mask coordinates back
/// to the original image, so the two stay in sync.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn scaled_dimensions(original: (u32, u32), target_size: u32) -> (u32, u32) {
    let target = target_size as f32;
    let scale = (target / original.0 as f32).min(target / original.1 as f32);
    let width = ((original.0 as f32 * scale).round() as u32).min(target_size).max(1);
    let height = ((original.1 as f32 * scale).round() as u32).min(target_size).max(1);
    (width, height)
}
