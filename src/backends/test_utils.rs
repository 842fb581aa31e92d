//! Mock inference backend for tests
//!
//! Produces a deterministic circular mask without touching model files or
//! ONNX Runtime, so the processing pipeline can be tested in isolation.

use crate::{
    config::RemovalConfig,
    error::{RemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use ndarray::Array4;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock backend that returns a soft circular mask
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    model_info: ModelInfo,
    preprocessing_config: PreprocessingConfig,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-model".to_owned(),
                size_bytes: 1024 * 1024,
                input_shape: (1, 3, 320, 320),
                output_shape: (1, 1, 320, 320),
            },
            preprocessing_config: PreprocessingConfig {
                target_size: [320, 320],
                normalization_mean: [0.485, 0.456, 0.406],
                normalization_std: [0.229, 0.224, 0.225],
            },
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Mock backend that fails during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Mock backend that fails during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Calls recorded so far, in order
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_owned());
        }
    }

    fn generate_mock_output(&self, input: &Array4<f32>) -> Array4<f32> {
        let batch_size = input.shape()[0];
        let height = input.shape()[2];
        let width = input.shape()[3];

        let mut output = Array4::<f32>::zeros((batch_size, 1, height, width));
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = (width.min(height) as f32 / 3.0).max(10.0);

        for b in 0..batch_size {
            for y in 0..height {
                for x in 0..width {
                    let dx = x as f32 - center_x;
                    let dy = y as f32 - center_y;
                    let distance = (dx * dx + dy * dy).sqrt();
                    if distance < radius {
                        output[[b, 0, y, x]] = ((radius - distance) / radius).clamp(0.0, 1.0);
                    }
                }
            }
        }

        output
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        if self.should_fail_init {
            return Err(RemovalError::inference("Mock initialization failure"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(RemovalError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(RemovalError::inference("Mock inference failure"));
        }
        Ok(self.generate_mock_output(input))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.input_shape
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.output_shape
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_lifecycle() {
        let mut backend = MockBackend::new();
        assert!(!backend.is_initialized());

        let load_time = backend.initialize(&RemovalConfig::default()).unwrap();
        assert!(load_time.is_some());
        assert!(backend.is_initialized());

        // Second initialization is a no-op
        assert!(backend.initialize(&RemovalConfig::default()).unwrap().is_none());
        assert_eq!(backend.call_history(), vec!["initialize", "initialize"]);
    }

    #[test]
    fn test_mock_backend_produces_mask() {
        let mut backend = MockBackend::new();
        backend.initialize(&RemovalConfig::default()).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        let output = backend.infer(&input).unwrap();
        assert_eq!(output.dim(), (1, 1, 320, 320));

        // Center is foreground, corners are background
        assert!(output[[0, 0, 160, 160]] > 0.9);
        assert!(output[[0, 0, 0, 0]] < f32::EPSILON);
    }

    #[test]
    fn test_mock_backend_failure_modes() {
        let mut failing_init = MockBackend::new_failing_init();
        assert!(failing_init.initialize(&RemovalConfig::default()).is_err());

        let mut failing_infer = MockBackend::new_failing_inference();
        failing_infer.initialize(&RemovalConfig::default()).unwrap();
        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        assert!(failing_infer.infer(&input).is_err());
    }

    #[test]
    fn test_infer_before_initialize_fails() {
        let mut backend = MockBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        assert!(backend.infer(&input).is_err());
    }
}
