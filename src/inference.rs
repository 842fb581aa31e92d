//! Inference backend abstraction

use crate::{config::RemovalConfig, error::Result};
use ndarray::Array4;
use std::time::Duration;

/// Trait for inference backends
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time on first initialization, `None` if the
    /// backend was already initialized.
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Invalid input tensor dimensions
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get the expected input shape for this backend (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Get the expected output shape for this backend (NCHW)
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    fn get_preprocessing_config(&self) -> Result<crate::models::PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model metadata unavailable
    fn get_model_info(&self) -> Result<crate::models::ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
