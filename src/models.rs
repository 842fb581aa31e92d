//! Model registry and management for the rembg model family
//!
//! The five pretrained segmentation models exposed by the UI are fixed and
//! described by a static registry: where to download the ONNX file from,
//! what input size the network expects, and how to normalize pixels.

use crate::cache::ModelCache;
use crate::error::{RemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Pretrained model configurations selectable in the UI
///
/// Serialized identifiers match the upstream rembg model names exactly,
/// including the underscore in `u2net_human_seg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelName {
    /// U²-Net general purpose model (fast, medium quality)
    #[serde(rename = "u2net")]
    U2net,
    /// ISNet general use (high quality, slower)
    #[serde(rename = "isnet-general-use")]
    IsnetGeneralUse,
    /// U²-Net variant trained on human segmentation (portraits, hair)
    #[serde(rename = "u2net_human_seg")]
    U2netHumanSeg,
    /// Silueta, a size-reduced general purpose model
    #[serde(rename = "silueta")]
    Silueta,
    /// ISNet variant trained on anime/illustration images
    #[serde(rename = "isnet-anime")]
    IsnetAnime,
}

impl ModelName {
    /// All selectable models, in the order the UI presents them
    #[must_use]
    pub const fn all() -> [ModelName; 5] {
        [
            ModelName::U2net,
            ModelName::IsnetGeneralUse,
            ModelName::U2netHumanSeg,
            ModelName::Silueta,
            ModelName::IsnetAnime,
        ]
    }

    /// Canonical identifier, used in cache file names and download suffixes
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ModelName::U2net => "u2net",
            ModelName::IsnetGeneralUse => "isnet-general-use",
            ModelName::U2netHumanSeg => "u2net_human_seg",
            ModelName::Silueta => "silueta",
            ModelName::IsnetAnime => "isnet-anime",
        }
    }

    /// Registry entry for this model
    #[must_use]
    pub fn spec(self) -> &'static ModelSpec {
        match self {
            ModelName::U2net => &MODEL_REGISTRY[0],
            ModelName::IsnetGeneralUse => &MODEL_REGISTRY[1],
            ModelName::U2netHumanSeg => &MODEL_REGISTRY[2],
            ModelName::Silueta => &MODEL_REGISTRY[3],
            ModelName::IsnetAnime => &MODEL_REGISTRY[4],
        }
    }
}

impl Default for ModelName {
    fn default() -> Self {
        // The UI preselects the high quality general model
        ModelName::IsnetGeneralUse
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelName {
    type Err = RemovalError;

    fn from_str(s: &str) -> Result<Self> {
        ModelName::all()
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let available: Vec<&str> = ModelName::all().iter().map(|m| m.as_str()).collect();
                RemovalError::invalid_config(format!(
                    "Unknown model '{s}'. Available: {}",
                    available.join(", ")
                ))
            })
    }
}

/// Static description of a pretrained model
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Model identifier
    pub name: ModelName,
    /// ONNX file name inside the cache directory
    pub file_name: &'static str,
    /// Upstream download URL for the ONNX file
    pub url: &'static str,
    /// Preprocessing parameters the network was trained with
    pub preprocessing: PreprocessingConfig,
    /// One-line description shown in the UI model picker
    pub description: &'static str,
}

/// Preprocessing configuration for model inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Target input size (width, height) of the network
    pub target_size: [u32; 2],
    /// Per-channel normalization mean (RGB, 0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization standard deviation
    pub normalization_std: [f32; 3],
}

const U2NET_PREPROCESSING: PreprocessingConfig = PreprocessingConfig {
    target_size: [320, 320],
    normalization_mean: [0.485, 0.456, 0.406],
    normalization_std: [0.229, 0.224, 0.225],
};

const ISNET_PREPROCESSING: PreprocessingConfig = PreprocessingConfig {
    target_size: [1024, 1024],
    normalization_mean: [0.5, 0.5, 0.5],
    normalization_std: [1.0, 1.0, 1.0],
};

/// The fixed registry of selectable models
pub static MODEL_REGISTRY: [ModelSpec; 5] = [
    ModelSpec {
        name: ModelName::U2net,
        file_name: "u2net.onnx",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx",
        preprocessing: U2NET_PREPROCESSING,
        description: "Fast general purpose model (original default)",
    },
    ModelSpec {
        name: ModelName::IsnetGeneralUse,
        file_name: "isnet-general-use.onnx",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/isnet-general-use.onnx",
        preprocessing: ISNET_PREPROCESSING,
        description: "High quality general model, best for photos",
    },
    ModelSpec {
        name: ModelName::U2netHumanSeg,
        file_name: "u2net_human_seg.onnx",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net_human_seg.onnx",
        preprocessing: U2NET_PREPROCESSING,
        description: "Specialized for humans, excellent for portraits",
    },
    ModelSpec {
        name: ModelName::Silueta,
        file_name: "silueta.onnx",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/silueta.onnx",
        preprocessing: U2NET_PREPROCESSING,
        description: "Compact general purpose model",
    },
    ModelSpec {
        name: ModelName::IsnetAnime,
        file_name: "isnet-anime.onnx",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/isnet-anime.onnx",
        preprocessing: ISNET_PREPROCESSING,
        description: "Specialized for anime and illustrations",
    },
];

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Resolves a model name to cached ONNX bytes and metadata
#[derive(Debug)]
pub struct ModelManager {
    model: ModelName,
    cache: ModelCache,
}

impl ModelManager {
    /// Create a manager for the given model using the default cache location
    ///
    /// # Errors
    /// - Failed to determine or create the cache directory
    pub fn new(model: ModelName) -> Result<Self> {
        Ok(Self {
            model,
            cache: ModelCache::new()?,
        })
    }

    /// Create a manager with an explicit cache
    #[must_use]
    pub fn with_cache(model: ModelName, cache: ModelCache) -> Self {
        Self { model, cache }
    }

    /// The model this manager resolves
    #[must_use]
    pub fn model(&self) -> ModelName {
        self.model
    }

    /// Path where the cached ONNX file is expected
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.cache.model_path(self.model)
    }

    /// Load the ONNX model bytes from the cache
    ///
    /// # Errors
    /// - Model file missing from the cache (not downloaded yet)
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.model_path();
        if !path.exists() {
            return Err(RemovalError::model_error_with_context(
                "load",
                self.model.as_str(),
                "model file not found in cache",
                &["download it first (it is fetched automatically on first use)"],
            ));
        }
        fs::read(&path).map_err(|e| RemovalError::file_io_error("read model file", &path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let path = self.model_path();
        let size_bytes = fs::metadata(&path)
            .map(|m| m.len() as usize)
            .map_err(|e| RemovalError::file_io_error("stat model file", &path, &e))?;
        let side = self.model.spec().preprocessing.target_size[0] as usize;
        Ok(ModelInfo {
            name: self.model.as_str().to_owned(),
            size_bytes,
            input_shape: (1, 3, side, side),
            output_shape: (1, 1, side, side),
        })
    }

    /// Get the preprocessing configuration for the managed model
    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model.spec().preprocessing.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_BASE: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

    #[test]
    fn test_registry_is_complete_and_consistent() {
        assert_eq!(MODEL_REGISTRY.len(), ModelName::all().len());
        for (model, spec) in ModelName::all().iter().zip(MODEL_REGISTRY.iter()) {
            assert_eq!(*model, spec.name);
            assert!(spec.url.starts_with(RELEASE_BASE));
            assert!(spec.url.ends_with(spec.file_name));
            assert_eq!(spec.preprocessing.target_size[0], spec.preprocessing.target_size[1]);
        }
    }

    #[test]
    fn test_model_name_round_trip() {
        for model in ModelName::all() {
            let parsed: ModelName = model.as_str().parse().unwrap();
            assert_eq!(parsed, model);
        }
        assert!("not-a-model".parse::<ModelName>().is_err());
    }

    #[test]
    fn test_default_model_is_isnet_general_use() {
        assert_eq!(ModelName::default(), ModelName::IsnetGeneralUse);
    }

    #[test]
    fn test_preprocessing_per_family() {
        assert_eq!(ModelName::U2net.spec().preprocessing.target_size, [320, 320]);
        assert_eq!(ModelName::Silueta.spec().preprocessing.target_size, [320, 320]);
        assert_eq!(
            ModelName::IsnetGeneralUse.spec().preprocessing.target_size,
            [1024, 1024]
        );
        assert_eq!(ModelName::IsnetAnime.spec().preprocessing.target_size, [1024, 1024]);
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ModelName::IsnetGeneralUse).unwrap();
        assert_eq!(json, "\"isnet-general-use\"");
        let back: ModelName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelName::IsnetGeneralUse);
    }
}
