#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Détourage
//!
//! Background removal with a web interface, built on ONNX Runtime and the
//! rembg family of segmentation models.
//!
//! Upload an image, pick one of five pretrained models, optionally enable
//! alpha-matting edge refinement, and get back a transparent PNG. Model
//! files are downloaded on first use and cached on disk; loaded ONNX
//! sessions are pooled in memory and reused across requests.
//!
//! ## Models
//!
//! - `u2net`: fast general purpose model
//! - `isnet-general-use` (default): high quality general model
//! - `u2net_human_seg`: specialized for people and portraits
//! - `silueta`: compact general purpose model
//! - `isnet-anime`: specialized for anime and illustrations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use detourage::{remove_background_from_bytes, ModelName, RemovalConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .model(ModelName::IsnetGeneralUse)
//!     .alpha_matting(true)
//!     .build()?;
//!
//! let input = tokio::fs::read("input.jpg").await?;
//! let result = remove_background_from_bytes(&input, &config).await?;
//! result.save_png("output.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `web` (default): axum web interface
//! - `cli` (default): command-line entry point and progress reporting
//! - `webp-support` (default): WebP upload support

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod matting;
pub mod models;
pub mod processor;
pub mod session_pool;
pub mod tracing_config;
pub mod types;
pub mod utils;
#[cfg(feature = "web")]
pub mod web;

pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use config::{AlphaMattingConfig, ExecutionProvider, RemovalConfig};
pub use download::ModelDownloader;
pub use error::{RemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelManager, ModelName, ModelSpec, PreprocessingConfig};
pub use processor::BackgroundRemover;
pub use session_pool::SessionPool;
pub use tracing_config::TracingConfig;
pub use types::{
    output_file_name, ProcessingMetadata, ProcessingTimings, RemovalResult, SegmentationMask,
};

#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;

/// Remove the background from encoded image bytes
///
/// Downloads the configured model into the cache if it is not present
/// yet, then runs the full pipeline. For repeated calls with the same
/// model prefer [`SessionPool`], which keeps the loaded session alive.
///
/// # Errors
/// - Model download failures
/// - Image decoding or inference failures
#[cfg(feature = "onnx")]
pub async fn remove_background_from_bytes(
    bytes: &[u8],
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let downloader = ModelDownloader::new()?;
    downloader.ensure_model(config.model, false).await?;

    let config = config.clone();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || {
        let mut remover = BackgroundRemover::new(config)?;
        remover.process_bytes(&bytes)
    })
    .await
    .map_err(|e| RemovalError::internal(format!("Processing task panicked: {e}")))?
}
