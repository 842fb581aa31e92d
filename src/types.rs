//! Core types for background removal operations

use crate::error::Result;
use crate::models::ModelName;
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The processed image with background made transparent
    pub image: DynamicImage,

    /// The segmentation mask used for removal
    pub mask: SegmentationMask,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl RemovalResult {
    /// Create a new removal result
    #[must_use]
    pub fn new(
        image: DynamicImage,
        mask: SegmentationMask,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            mask,
            original_dimensions,
            metadata,
        }
    }

    /// Encode the result as PNG bytes, recording the encode time
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn to_png_bytes(&mut self) -> Result<Vec<u8>> {
        let encode_start = std::time::Instant::now();
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, image::ImageFormat::Png)?;
        self.metadata.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(buffer)
    }

    /// Save the result as PNG with alpha channel
    ///
    /// # Errors
    /// - File I/O or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }
}

/// Build the download file name for a processed image
///
/// The upload's stem, the model identifier, and a `_no_bg.png` suffix.
#[must_use]
pub fn output_file_name(input_name: &str, model: ModelName) -> String {
    let stem = input_name.split('.').next().unwrap_or(input_name);
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{stem}_{model}_no_bg.png")
}

/// Grayscale segmentation mask at the original image resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Apply the mask as the alpha channel of an RGBA image
    ///
    /// # Errors
    /// - Image and mask dimensions do not match
    pub fn apply_to_image(&self, image: &mut ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<()> {
        let (img_width, img_height) = image.dimensions();
        if (img_width, img_height) != self.dimensions {
            return Err(crate::error::RemovalError::processing(
                "Image and mask dimensions do not match",
            ));
        }

        for (i, pixel) in image.pixels_mut().enumerate() {
            let alpha = self.data.get(i).copied().unwrap_or(0);
            pixel[3] = alpha;
        }

        Ok(())
    }

    /// Fraction of pixels classified as foreground (mask value > 127)
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v > 127).count() as f32;
        foreground / self.data.len() as f32
    }
}

/// Detailed timing breakdown for background removal processing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: u64,

    /// Image decoding from uploaded bytes
    pub image_decode_ms: u64,

    /// Image preprocessing (resize, normalize, tensor conversion)
    pub preprocessing_ms: u64,

    /// ONNX Runtime inference execution
    pub inference_ms: u64,

    /// Postprocessing (mask generation, matting, alpha application)
    pub postprocessing_ms: u64,

    /// Final PNG encoding (if encoded)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

/// Metadata about a processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Model used for inference
    pub model: ModelName,

    /// Whether alpha-matting edge refinement ran
    pub alpha_matting: bool,

    /// When the operation completed
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessingMetadata {
    /// Create new processing metadata
    #[must_use]
    pub fn new(model: ModelName, alpha_matting: bool) -> Self {
        Self {
            timings: ProcessingTimings::default(),
            model,
            alpha_matting,
            processed_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_mask_creation() {
        let data = vec![255, 128, 0, 255];
        let mask = SegmentationMask::new(data, (2, 2));

        assert_eq!(mask.dimensions, (2, 2));
        assert_eq!(mask.data.len(), 4);
    }

    #[test]
    fn test_mask_foreground_ratio() {
        let mask = SegmentationMask::new(vec![255, 255, 0, 0], (2, 2));
        assert!((mask.foreground_ratio() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mask_application() {
        let mut image = ImageBuffer::from_pixel(2, 2, Rgba([10u8, 20, 30, 255]));
        let mask = SegmentationMask::new(vec![255, 128, 0, 64], (2, 2));

        mask.apply_to_image(&mut image).unwrap();
        assert_eq!(image.get_pixel(0, 0)[3], 255);
        assert_eq!(image.get_pixel(1, 0)[3], 128);
        assert_eq!(image.get_pixel(0, 1)[3], 0);
        assert_eq!(image.get_pixel(1, 1)[3], 64);
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let mut image = ImageBuffer::from_pixel(3, 3, Rgba([0u8, 0, 0, 255]));
        let mask = SegmentationMask::new(vec![255; 4], (2, 2));
        assert!(mask.apply_to_image(&mut image).is_err());
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("photo.jpg", ModelName::U2net),
            "photo_u2net_no_bg.png"
        );
        assert_eq!(
            output_file_name("holiday.picture.webp", ModelName::IsnetGeneralUse),
            "holiday_isnet-general-use_no_bg.png"
        );
        assert_eq!(
            output_file_name(".hidden", ModelName::Silueta),
            "image_silueta_no_bg.png"
        );
    }

    #[test]
    fn test_png_round_trip_preserves_dimensions() {
        let rgba = ImageBuffer::from_pixel(4, 3, Rgba([1u8, 2, 3, 4]));
        let mut result = RemovalResult::new(
            DynamicImage::ImageRgba8(rgba),
            SegmentationMask::new(vec![255; 12], (4, 3)),
            (4, 3),
            ProcessingMetadata::new(ModelName::U2net, false),
        );

        let bytes = result.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert!(result.metadata.timings.image_encode_ms.is_some());
    }
}
