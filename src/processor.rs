//! Background removal processing pipeline
//!
//! Orchestrates the full render: decode, preprocess, inference, mask
//! generation, optional alpha-matting refinement and alpha application,
//! with per-stage timings collected along the way.

use crate::config::RemovalConfig;
use crate::error::{RemovalError, Result};
use crate::inference::InferenceBackend;
use crate::matting;
use crate::types::{ProcessingMetadata, ProcessingTimings, RemovalResult, SegmentationMask};
use crate::utils::preprocessing::{scaled_dimensions, ImagePreprocessor};
use image::{DynamicImage, GenericImageView, RgbaImage};
use ndarray::Array4;
use std::time::Instant;

/// Coordinate mapping from original image space into tensor space
struct CoordinateTransformation {
    scale: f32,
    offset_x: u32,
    offset_y: u32,
    mask_width: u32,
    mask_height: u32,
}

/// Background removal processor bound to one model and configuration
pub struct BackgroundRemover {
    config: RemovalConfig,
    backend: Box<dyn InferenceBackend>,
    model_load_ms: Option<u64>,
}

impl BackgroundRemover {
    /// Create a processor backed by ONNX Runtime
    ///
    /// The backend is initialized lazily on the first render; the model
    /// file must already be present in the cache.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Cache directory resolution failures
    #[cfg(feature = "onnx")]
    pub fn new(config: RemovalConfig) -> Result<Self> {
        config.validate()?;
        let model_manager = crate::models::ModelManager::new(config.model)?;
        let backend = Box::new(crate::backends::OnnxBackend::new(model_manager));
        Ok(Self {
            config,
            backend,
            model_load_ms: None,
        })
    }

    /// Create a processor with an explicit inference backend
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(config: RemovalConfig, backend: Box<dyn InferenceBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            model_load_ms: None,
        })
    }

    /// The configuration this processor runs with
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Whether the backend has loaded its model
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.is_initialized()
    }

    /// Toggle alpha-matting refinement for subsequent renders
    ///
    /// Matting is a postprocessing step, so flipping it does not invalidate
    /// the loaded model session.
    pub fn set_alpha_matting(&mut self, enabled: bool) {
        self.config.alpha_matting = enabled;
    }

    /// Remove the background from encoded image bytes
    ///
    /// # Errors
    /// - Image decoding failures
    /// - Inference execution errors
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let decode_start = Instant::now();
        let image = image::load_from_memory(bytes)?;
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        self.process_image(image, timings, total_start)
    }

    /// Remove the background from an already decoded image
    ///
    /// # Errors
    /// - Inference execution errors
    pub fn process(&mut self, image: DynamicImage) -> Result<RemovalResult> {
        let total_start = Instant::now();
        self.process_image(image, ProcessingTimings::default(), total_start)
    }

    fn process_image(
        &mut self,
        image: DynamicImage,
        mut timings: ProcessingTimings,
        total_start: Instant,
    ) -> Result<RemovalResult> {
        let original_dimensions = image.dimensions();

        // Lazy model load, charged to the first render only
        if let Some(load_time) = self.backend.initialize(&self.config)? {
            let ms = load_time.as_millis() as u64;
            self.model_load_ms = Some(ms);
            timings.model_load_ms = ms;
        }

        let preprocess_start = Instant::now();
        let preprocessing_config = self.backend.get_preprocessing_config()?;
        let input_tensor =
            ImagePreprocessor::preprocess_for_inference(&image, &preprocessing_config)?;
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        let inference_start = Instant::now();
        let output_tensor = self.backend.infer(&input_tensor)?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        let postprocess_start = Instant::now();
        let mut mask = Self::tensor_to_mask(&output_tensor, original_dimensions)?;
        if self.config.alpha_matting {
            mask = matting::refine_mask(&mask, &self.config.alpha_matting_config);
        }
        let result_image = Self::apply_mask_to_image(&image, &mask);
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        tracing::debug!(
            model = %self.config.model,
            alpha_matting = self.config.alpha_matting,
            total_ms = timings.total_ms,
            inference_ms = timings.inference_ms,
            "render complete"
        );

        let mut metadata = ProcessingMetadata::new(self.config.model, self.config.alpha_matting);
        metadata.timings = timings;

        Ok(RemovalResult::new(
            DynamicImage::ImageRgba8(result_image),
            mask,
            original_dimensions,
            metadata,
        ))
    }

    /// Convert the model's output tensor into a mask at the original
    /// image resolution
    ///
    /// The raw scores are min-max normalized to the full 0-255 range, then
    /// each original pixel is mapped back through the preprocessing resize
    /// and centering to find its tensor value.
    fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        let shape = tensor.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 {
            return Err(RemovalError::processing("Invalid output tensor shape"));
        }

        let (min, max) = tensor.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        let range = if (max - min).abs() < f32::EPSILON {
            1.0
        } else {
            max - min
        };

        let transformation = Self::inverse_transformation(tensor, original_dimensions);
        let (orig_width, orig_height) = original_dimensions;
        let mut mask_data = Vec::with_capacity((orig_width as usize) * (orig_height as usize));

        for y in 0..orig_height {
            for x in 0..orig_width {
                let raw = Self::tensor_value_at(tensor, x, y, &transformation).unwrap_or(min);
                let normalized = (raw - min) / range;
                mask_data.push((normalized.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }

        Ok(SegmentationMask::new(mask_data, original_dimensions))
    }

    /// Recompute the preprocessing transform so tensor coordinates can be
    /// mapped back to original pixels
    fn inverse_transformation(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> CoordinateTransformation {
        let shape = tensor.shape();
        let mask_height = shape.get(2).copied().unwrap_or(0) as u32;
        let mask_width = shape.get(3).copied().unwrap_or(0) as u32;

        let (scaled_width, scaled_height) = scaled_dimensions(original_dimensions, mask_width);
        let scale = (mask_width as f32 / original_dimensions.0 as f32)
            .min(mask_width as f32 / original_dimensions.1 as f32);

        CoordinateTransformation {
            scale,
            offset_x: (mask_width - scaled_width) / 2,
            offset_y: (mask_height.max(scaled_height) - scaled_height) / 2,
            mask_width,
            mask_height,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn tensor_value_at(
        tensor: &Array4<f32>,
        x: u32,
        y: u32,
        transformation: &CoordinateTransformation,
    ) -> Option<f32> {
        let scaled_x = (x as f32 * transformation.scale).round() as u32;
        let scaled_y = (y as f32 * transformation.scale).round() as u32;
        let tensor_x = scaled_x + transformation.offset_x;
        let tensor_y = scaled_y + transformation.offset_y;

        if tensor_x < transformation.mask_width && tensor_y < transformation.mask_height {
            tensor
                .get([0, 0, tensor_y as usize, tensor_x as usize])
                .copied()
        } else {
            None
        }
    }

    /// Apply the mask as alpha over the original pixels
    fn apply_mask_to_image(image: &DynamicImage, mask: &SegmentationMask) -> RgbaImage {
        let rgba_image = image.to_rgba8();
        let (width, height) = rgba_image.dimensions();
        let mut result = RgbaImage::new(width, height);

        for (x, y, pixel) in rgba_image.enumerate_pixels() {
            let pixel_index = (y * width + x) as usize;
            let alpha = mask.data.get(pixel_index).copied().unwrap_or(0);
            if alpha > 0 {
                result.put_pixel(x, y, image::Rgba([pixel[0], pixel[1], pixel[2], alpha]));
            } else {
                result.put_pixel(x, y, image::Rgba([0, 0, 0, 0]));
            }
        }

        result
    }
}
