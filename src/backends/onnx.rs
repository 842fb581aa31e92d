//! ONNX Runtime backend
//!
//! Runs the downloaded segmentation models through ort with support for
//! CPU, CUDA and CoreML execution providers. Unavailable providers fall
//! back to CPU with a warning rather than failing the request.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::{RemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelManager;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};
use std::time::{Duration, Instant};

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
    initialized: bool,
}

impl OnnxBackend {
    /// Create a new ONNX backend for the given model manager
    #[must_use]
    pub fn new(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
            initialized: false,
        }
    }

    /// List execution providers with availability status
    ///
    /// Returns `(name, available, description)` tuples. CPU is always
    /// reported as available.
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "cpu".to_owned(),
                true,
                "Always available, uses CPU for inference".to_owned(),
            ),
            (
                "cuda".to_owned(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit)".to_owned(),
            ),
            (
                "coreml".to_owned(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_owned(),
            ),
        ]
    }

    fn load_model(&mut self, config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;

        let mut session_builder = Session::builder()
            .map_err(|e| RemovalError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| RemovalError::inference(format!("Failed to set optimization level: {e}")))?;

        session_builder = match config.execution_provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    tracing::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                }

                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    tracing::info!("CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }

                if providers.is_empty() {
                    tracing::debug!("no hardware acceleration available, using CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            RemovalError::inference(format!(
                                "Failed to set execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                tracing::info!("using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    tracing::info!("using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(|e| {
                            RemovalError::inference_error_with_provider(
                                "cuda",
                                "set execution provider",
                                &e.to_string(),
                                &["--execution-provider cpu"],
                            )
                        })?
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    tracing::info!("using CoreML execution provider");
                    session_builder
                        .with_execution_providers([CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build()])
                        .map_err(|e| {
                            RemovalError::inference_error_with_provider(
                                "coreml",
                                "set execution provider",
                                &e.to_string(),
                                &["--execution-provider cpu"],
                            )
                        })?
                } else {
                    tracing::warn!("CoreML requested but not available, falling back to CPU");
                    session_builder
                }
            },
        };

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| RemovalError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| RemovalError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| RemovalError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| RemovalError::inference(format!("Failed to create session from model data: {e}")))?;

        let model_load_time = model_load_start.elapsed();
        tracing::info!(
            model = %self.model_manager.model(),
            provider = %config.execution_provider,
            intra_threads,
            inter_threads,
            load_ms = model_load_time.as_millis() as u64,
            "ONNX session created"
        );

        self.session = Some(session);
        self.initialized = true;
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(RemovalError::internal("Backend not initialized"));
        }
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RemovalError::internal("ONNX session not initialized"))?;

        tracing::debug!(input_shape = ?input.dim(), "starting inference");

        let input_value = Value::from_array(input.clone())
            .map_err(|e| RemovalError::processing(format!("Failed to convert input tensor: {e}")))?;

        let core_inference_start = Instant::now();
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| RemovalError::processing(format!("ONNX inference failed: {e}")))?;
        tracing::debug!(
            inference_ms = core_inference_start.elapsed().as_millis() as u64,
            "core inference complete"
        );

        // Positional output access: the segmentation mask is always the
        // first output regardless of the model's tensor names.
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| RemovalError::processing("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| RemovalError::processing("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| RemovalError::processing(format!("Failed to extract output tensor: {e}")))?;

        let output_shape = output_tensor.shape();
        if output_shape.len() != 4 {
            return Err(RemovalError::processing(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_data = output_tensor.view().to_owned();
        Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            output_data.into_raw_vec_and_offset().0,
        )
        .map_err(|e| RemovalError::processing(format!("Failed to reshape output tensor: {e}")))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.model_manager.preprocessing_config().target_size[0] as usize;
        (1, 3, side, side)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        let side = self.model_manager.preprocessing_config().target_size[0] as usize;
        (1, 1, side, side)
    }

    fn get_preprocessing_config(&self) -> Result<crate::models::PreprocessingConfig> {
        Ok(self.model_manager.preprocessing_config())
    }

    fn get_model_info(&self) -> Result<crate::models::ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
