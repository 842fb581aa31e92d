//! Model downloading from the upstream release assets
//!
//! Each model is a single ONNX file fetched from the rembg GitHub release.
//! Downloads stream to a temporary file in the cache directory and are
//! renamed into place atomically so a crashed download never leaves a
//! half-written model behind.

use crate::cache::ModelCache;
use crate::error::{RemovalError, Result};
use crate::models::ModelName;
use futures_util::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;

static DOWNLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn new(show_progress: bool) -> Self {
        #[cfg(feature = "cli")]
        {
            if show_progress {
                let pb = ProgressBar::new(0);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                return Self::Indicatif(pb);
            }
        }
        let _ = show_progress;
        Self::NoOp
    }

    fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    fn inc(&self, delta: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.inc(delta),
            Self::NoOp => {
                let _ = delta;
            },
        }
    }

    fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

impl ModelDownloader {
    /// Create a new model downloader using the default cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader using an explicit cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| RemovalError::network_error("Failed to create HTTP client", e))?;
        Ok(Self { client, cache })
    }

    /// Return the cached model path, downloading the file first if needed
    ///
    /// # Errors
    /// - Network errors during download
    /// - File system errors during caching
    pub async fn ensure_model(&self, model: ModelName, show_progress: bool) -> Result<PathBuf> {
        if self.cache.is_model_cached(model) {
            tracing::debug!(model = %model, "model already cached");
            return Ok(self.cache.model_path(model));
        }
        self.download_model(model, show_progress).await
    }

    /// Download a model's ONNX file into the cache
    ///
    /// # Errors
    /// - Network errors or non-success HTTP status
    /// - File system errors while writing or renaming
    pub async fn download_model(&self, model: ModelName, show_progress: bool) -> Result<PathBuf> {
        let spec = model.spec();
        let final_path = self.cache.model_path(model);
        let temp_path = self.temp_download_path(model);

        tracing::info!(model = %model, url = spec.url, "downloading model");
        let progress = ProgressIndicator::new(show_progress);
        progress.set_message(format!("Downloading {model}"));

        match self.download_to(spec.url, &temp_path, &progress).await {
            Ok(digest) => {
                tokio::fs::rename(&temp_path, &final_path).await.map_err(|e| {
                    RemovalError::file_io_error("move downloaded model into cache", &final_path, &e)
                })?;
                progress.finish_with_message(format!("Downloaded {model}"));
                tracing::info!(model = %model, sha256 = %digest, path = %final_path.display(), "model download complete");
                Ok(final_path)
            },
            Err(e) => {
                if temp_path.exists() {
                    if let Err(cleanup_err) = tokio::fs::remove_file(&temp_path).await {
                        tracing::warn!(error = %cleanup_err, "failed to clean up partial download");
                    }
                }
                progress.finish_with_message("Download failed".to_owned());
                Err(e)
            },
        }
    }

    /// Temporary file for an in-flight download
    ///
    /// Concurrent downloads of the same model each write to their own temp
    /// file; whichever rename into place lands last wins, and both writers
    /// produce identical content.
    fn temp_download_path(&self, model: ModelName) -> PathBuf {
        let seq = DOWNLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        self.cache
            .cache_dir()
            .join(format!("{}.{pid}-{seq}.part", model.spec().file_name))
    }

    /// Stream a URL to a file, returning the SHA-256 digest of the content
    async fn download_to(
        &self,
        url: &str,
        path: &std::path::Path,
        progress: &ProgressIndicator,
    ) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemovalError::network_error("Failed to send download request", e))?;

        if !response.status().is_success() {
            return Err(RemovalError::Network(format!(
                "Download of {url} failed with HTTP status {}",
                response.status()
            )));
        }

        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| RemovalError::file_io_error("create download file", path, &e))?;

        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| RemovalError::network_error("Failed to read download stream", e))?
        {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| RemovalError::file_io_error("write download file", path, &e))?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }

        file.flush()
            .await
            .map_err(|e| RemovalError::file_io_error("flush download file", path, &e))?;

        if written == 0 {
            return Err(RemovalError::Network(format!(
                "Download of {url} produced an empty file"
            )));
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}
