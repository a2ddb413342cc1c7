//! ONNX sentence embeddings via fastembed
//!
//! Default model is `paraphrase-multilingual-MiniLM-L12-v2` (384 dimensions),
//! which handles the Russian text of the export.

use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::backend::{EmbeddingBackend, ModelLoader};
use super::discovery::find_model_cache_dir;
use super::generator::EmbeddingConfig;
use crate::error::{IndexError, Result};

/// Resolved model entry from the backend's supported list
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model: EmbeddingModel,
    pub model_code: String,
    pub dimension: usize,
}

/// Resolve a model by full code (`org/name`) or by its last path segment
pub fn resolve_model(name: &str) -> Result<ResolvedModel> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            info.model_code == name || info.model_code.rsplit('/').next() == Some(name)
        })
        .map(|info| ResolvedModel {
            model: info.model,
            model_code: info.model_code,
            dimension: info.dim,
        })
        .ok_or_else(|| {
            IndexError::backend("load model", format!("unsupported embedding model: {}", name))
        })
}

/// fastembed-backed model
pub struct FastEmbedBackend {
    model: Mutex<TextEmbedding>,
    model_code: String,
    dimension: usize,
}

impl FastEmbedBackend {
    /// Load (downloading on first use) the model named in the configuration
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let resolved = resolve_model(&config.model_name)?;

        let mut options = InitOptions::new(resolved.model.clone())
            .with_show_download_progress(config.show_download_progress);
        if let Some(cache_dir) = find_model_cache_dir(config.cache_dir.as_deref()) {
            log::info!("Using model cache: {}", cache_dir.display());
            options = options.with_cache_dir(cache_dir);
        }

        log::info!("Loading embedding model {}", resolved.model_code);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| IndexError::backend("load model", e))?;

        log::info!(
            "Loaded embedding model {} ({}d)",
            resolved.model_code,
            resolved.dimension
        );

        Ok(Self {
            model: Mutex::new(model),
            model_code: resolved.model_code,
            dimension: resolved.dimension,
        })
    }

    pub fn model_code(&self) -> &str {
        &self.model_code
    }
}

impl EmbeddingBackend for FastEmbedBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.model
            .lock()
            .embed(texts.to_vec(), Some(texts.len()))
            .map_err(|e| IndexError::backend("encode", e))
    }
}

/// Loader producing [`FastEmbedBackend`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct FastEmbedLoader;

impl ModelLoader for FastEmbedLoader {
    fn load(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        Ok(Arc::new(FastEmbedBackend::load(config)?))
    }
}
