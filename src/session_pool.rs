//! In-memory pool of per-model processor sessions
//!
//! Loading an ONNX session takes seconds for the larger models, so each
//! model's processor is created once and reused for every subsequent
//! render. Renders run on the blocking thread pool; a per-model mutex
//! serializes access to each session while different models can run
//! concurrently.

use crate::cache::ModelCache;
use crate::config::RemovalConfig;
use crate::download::ModelDownloader;
use crate::error::{RemovalError, Result};
use crate::models::ModelName;
use crate::processor::BackgroundRemover;
use crate::types::RemovalResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type RemoverFactory = dyn Fn(RemovalConfig) -> Result<BackgroundRemover> + Send + Sync;
type SharedRemover = Arc<Mutex<BackgroundRemover>>;

/// Pool of lazily created background removal sessions, one per model
pub struct SessionPool {
    base_config: RemovalConfig,
    cache: ModelCache,
    downloader: ModelDownloader,
    sessions: Mutex<HashMap<ModelName, SharedRemover>>,
    factory: Option<Box<RemoverFactory>>,
}

impl SessionPool {
    /// Create a pool using the default ONNX backend
    ///
    /// The `base_config`'s model field is ignored; the model is chosen
    /// per request.
    ///
    /// # Errors
    /// - Invalid base configuration
    /// - Cache or HTTP client initialization failures
    #[cfg(feature = "onnx")]
    pub fn new(base_config: RemovalConfig, cache: ModelCache) -> Result<Self> {
        base_config.validate()?;
        let downloader = ModelDownloader::with_cache(cache.clone())?;
        Ok(Self {
            base_config,
            cache,
            downloader,
            sessions: Mutex::new(HashMap::new()),
            factory: None,
        })
    }

    /// Create a pool with a custom processor factory
    ///
    /// # Errors
    /// - Invalid base configuration
    /// - HTTP client initialization failures
    pub fn with_factory(
        base_config: RemovalConfig,
        cache: ModelCache,
        factory: Box<RemoverFactory>,
    ) -> Result<Self> {
        base_config.validate()?;
        let downloader = ModelDownloader::with_cache(cache.clone())?;
        Ok(Self {
            base_config,
            cache,
            downloader,
            sessions: Mutex::new(HashMap::new()),
            factory: Some(factory),
        })
    }

    /// The model cache backing this pool
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Remove the background from encoded image bytes
    ///
    /// Downloads the model on first use, then reuses the cached session
    /// for every later request with the same model.
    ///
    /// # Errors
    /// - Model download failures
    /// - Image decoding or inference failures
    pub async fn remove_background(
        &self,
        model: ModelName,
        alpha_matting: bool,
        bytes: Vec<u8>,
    ) -> Result<RemovalResult> {
        self.downloader.ensure_model(model, false).await?;
        let remover = self.session_for(model).await?;

        // Inference is CPU-bound, keep it off the async runtime
        let mut guard = remover.lock_owned().await;
        tokio::task::spawn_blocking(move || {
            guard.set_alpha_matting(alpha_matting);
            guard.process_bytes(&bytes)
        })
        .await
        .map_err(|e| RemovalError::internal(format!("Processing task panicked: {e}")))?
    }

    /// Number of model sessions currently held by the pool
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn session_for(&self, model: ModelName) -> Result<SharedRemover> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&model) {
            return Ok(Arc::clone(existing));
        }

        tracing::info!(model = %model, "creating processor session");
        let mut config = self.base_config.clone();
        config.model = model;
        let remover = self.build_remover(config)?;
        let shared = Arc::new(Mutex::new(remover));
        sessions.insert(model, Arc::clone(&shared));
        Ok(shared)
    }

    fn build_remover(&self, config: RemovalConfig) -> Result<BackgroundRemover> {
        if let Some(factory) = &self.factory {
            return factory(config);
        }

        #[cfg(feature = "onnx")]
        {
            let model_manager =
                crate::models::ModelManager::with_cache(config.model, self.cache.clone());
            let backend = Box::new(crate::backends::OnnxBackend::new(model_manager));
            BackgroundRemover::with_backend(config, backend)
        }
        #[cfg(not(feature = "onnx"))]
        {
            Err(RemovalError::internal(
                "No inference backend available (onnx feature disabled)",
            ))
        }
    }
}
