//! Model cache management for downloaded ONNX files
//!
//! Downloaded models live in an XDG-compliant cache directory, one `.onnx`
//! file per model. The cache backs the `--list-models` and `--clear-cache`
//! CLI operations and the cached-status flags in the web UI model picker.

use crate::error::{RemovalError, Result};
use crate::models::ModelName;
use std::fs;
use std::path::{Path, PathBuf};

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Model identifier
    pub model: ModelName,
    /// Path to the cached ONNX file
    pub path: PathBuf,
    /// Size of the model file in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache manager
    ///
    /// Uses XDG Base Directory specification for cache location:
    /// - Linux/macOS: `~/.cache/detourage/models/`
    /// - Windows: `%LOCALAPPDATA%/detourage/models/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::default_cache_dir()?;
        Self::with_dir(cache_dir)
    }

    /// Create a cache manager rooted at an explicit directory
    ///
    /// # Errors
    /// - Failed to create the directory
    pub fn with_dir<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let cache_dir = dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                RemovalError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }
        Ok(Self { cache_dir })
    }

    /// Get the XDG-compliant cache directory path
    fn default_cache_dir() -> Result<PathBuf> {
        // Environment variable override takes precedence
        if let Ok(cache_override) = std::env::var("DETOURAGE_CACHE_DIR") {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                RemovalError::invalid_config(
                    "Failed to determine cache directory. Set DETOURAGE_CACHE_DIR environment variable.",
                )
            })?
            .join("detourage")
            .join("models"))
    }

    /// The directory models are cached in
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the cached ONNX file for a model (may not exist)
    #[must_use]
    pub fn model_path(&self, model: ModelName) -> PathBuf {
        self.cache_dir.join(model.spec().file_name)
    }

    /// Check if a model's ONNX file is present in the cache
    #[must_use]
    pub fn is_model_cached(&self, model: ModelName) -> bool {
        let path = self.model_path(model);
        // Zero-length files are failed downloads, treat them as missing
        fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false)
    }

    /// Scan the cache and return info for every model that is present
    ///
    /// # Errors
    /// - I/O errors when accessing model files
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();
        for model in ModelName::all() {
            let path = self.model_path(model);
            match fs::metadata(&path) {
                Ok(meta) if meta.len() > 0 => models.push(CachedModelInfo {
                    model,
                    path,
                    size_bytes: meta.len(),
                }),
                Ok(_) => {
                    tracing::debug!(model = %model, "skipping empty cached model file");
                },
                Err(_) => {},
            }
        }
        Ok(models)
    }

    /// Remove a single model from the cache
    ///
    /// # Errors
    /// - I/O errors when deleting the file
    pub fn clear_model(&self, model: ModelName) -> Result<bool> {
        let path = self.model_path(model);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| RemovalError::file_io_error("remove cached model", &path, &e))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove every cached model file
    ///
    /// # Errors
    /// - I/O errors when deleting files
    pub fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for model in ModelName::all() {
            if self.clear_model(model)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Format a byte size for human display
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
