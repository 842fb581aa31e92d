//! Configuration types for background removal operations

use crate::models::ModelName;
use serde::{Deserialize, Serialize};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = crate::error::RemovalError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(crate::error::RemovalError::invalid_config(format!(
                "Unknown execution provider '{other}'. Available: auto, cpu, cuda, coreml"
            ))),
        }
    }
}

/// Parameters for the optional alpha-matting edge refinement
///
/// Defaults match the upstream rembg alpha-matting option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaMattingConfig {
    /// Mask values at or above this are confident foreground (0-255)
    pub foreground_threshold: u8,
    /// Mask values at or below this are confident background (0-255)
    pub background_threshold: u8,
    /// Radius in pixels of the erosion applied to the confident regions
    pub erode_size: u32,
}

impl Default for AlphaMattingConfig {
    fn default() -> Self {
        Self {
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Which pretrained model to run
    pub model: ModelName,

    /// Whether to run alpha-matting edge refinement on the mask
    pub alpha_matting: bool,

    /// Alpha-matting parameters (only used when `alpha_matting` is set)
    pub alpha_matting_config: AlphaMattingConfig,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model: ModelName::default(),
            alpha_matting: false,
            alpha_matting_config: AlphaMattingConfig::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            debug: false,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent API construction
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Alpha-matting foreground threshold not above the background threshold
    pub fn validate(&self) -> crate::error::Result<()> {
        let matting = &self.alpha_matting_config;
        if matting.foreground_threshold <= matting.background_threshold {
            return Err(crate::error::RemovalError::config_value_error(
                "alpha matting thresholds",
                format!(
                    "foreground {} <= background {}",
                    matting.foreground_threshold, matting.background_threshold
                ),
                "foreground must be greater than background",
                Some("foreground 240, background 10".to_owned()),
            ));
        }
        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set the model to run
    #[must_use]
    pub fn model(mut self, model: ModelName) -> Self {
        self.config.model = model;
        self
    }

    /// Enable or disable alpha-matting edge refinement
    #[must_use]
    pub fn alpha_matting(mut self, enabled: bool) -> Self {
        self.config.alpha_matting = enabled;
        self
    }

    /// Set alpha-matting parameters
    #[must_use]
    pub fn alpha_matting_config(mut self, matting: AlphaMattingConfig) -> Self {
        self.config.alpha_matting_config = matting;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set number of inter-op threads
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both intra and inter threads with a sensible ratio
    ///
    /// Intra-op gets the full count, inter-op half of it (minimum 1).
    /// Zero leaves both in auto-detect mode.
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Invalid alpha-matting threshold ordering
    pub fn build(self) -> crate::error::Result<RemovalConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}
