//! Embedding generator
//!
//! High-level API for turning text into vectors. The model is acquired lazily
//! on first use and shared for the lifetime of the generator. Configuration is
//! frozen once the model is loaded: changing it afterwards fails with
//! [`IndexError::ConfigurationLocked`] unless the caller explicitly
//! re-initializes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::backend::{EmbeddingBackend, ModelLoader};
use super::onnx::FastEmbedLoader;
use crate::error::{IndexError, Result};

/// Default multilingual sentence model
pub const DEFAULT_MODEL: &str = "paraphrase-multilingual-MiniLM-L12-v2";

/// Substitute for empty input so every text gets a well-defined vector
const EMPTY_TEXT_SUBSTITUTE: &str = " ";

/// Embedding configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Model name, either a full code or its last path segment
    pub model_name: String,
    /// Where downloaded models are cached (discovered if None)
    pub cache_dir: Option<PathBuf>,
    /// Texts per backend call (default: 32)
    pub batch_size: usize,
    /// Show download progress on first model fetch
    pub show_download_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            cache_dir: None,
            batch_size: 32,
            show_download_progress: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(IndexError::invalid_config("model name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(IndexError::invalid_config("batch size must be positive"));
        }
        Ok(())
    }
}

/// Lazily loaded embedding model with a per-text cache
pub struct EmbeddingGenerator {
    config: EmbeddingConfig,
    loader: Arc<dyn ModelLoader>,
    model: Mutex<Option<Arc<dyn EmbeddingBackend>>>,
    cache: DashMap<String, Vec<f32>>,
}

impl EmbeddingGenerator {
    /// Create a generator backed by fastembed
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        Self::with_loader(config, Arc::new(FastEmbedLoader))
    }

    /// Create a generator with a custom model loader
    pub fn with_loader(config: EmbeddingConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loader,
            model: Mutex::new(None),
            cache: DashMap::new(),
        })
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// True once the model has been acquired
    pub fn is_loaded(&self) -> bool {
        self.model.lock().is_some()
    }

    /// Acquire the model, loading it on first call
    pub fn load(&self) -> Result<Arc<dyn EmbeddingBackend>> {
        let mut slot = self.model.lock();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let model = self.loader.load(&self.config)?;
        log::info!(
            "Embedding model {} ready ({}d)",
            self.config.model_name,
            model.dimension()
        );
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Change the model before it is loaded.
    ///
    /// Fails with `ConfigurationLocked` once the model is loaded; use
    /// [`reinitialize`](Self::reinitialize) to switch models afterwards.
    pub fn set_model_name(&mut self, model_name: impl Into<String>) -> Result<()> {
        let model_name = model_name.into();
        if self.is_loaded() {
            return Err(IndexError::configuration_locked(format!(
                "model {} is already loaded; re-initialize to switch to {}",
                self.config.model_name, model_name
            )));
        }
        let config = self.config.clone().with_model(model_name);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Replace the configuration, dropping any loaded model and cached vectors
    pub fn reinitialize(&mut self, config: EmbeddingConfig) -> Result<()> {
        config.validate()?;
        log::info!(
            "Re-initializing embedding generator: {} -> {}",
            self.config.model_name,
            config.model_name
        );
        *self.model.get_mut() = None;
        self.cache.clear();
        self.config = config;
        Ok(())
    }

    /// Embedding dimension (loads the model)
    pub fn dimension(&self) -> Result<usize> {
        Ok(self.load()?.dimension())
    }

    /// Embed a single text
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let text = normalize(text);
        if let Some(cached) = self.cache.get(text) {
            return Ok(cached.clone());
        }

        let model = self.load()?;
        let mut vectors = model
            .encode(&[text.to_string()])
            .map_err(|e| with_operation(e, "encode query"))?;
        let vector = match vectors.pop() {
            Some(v) if vectors.is_empty() => v,
            _ => {
                return Err(IndexError::backend(
                    "encode query",
                    "backend returned an unexpected number of vectors",
                ))
            }
        };

        self.cache.insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    /// Embed many texts in batches; output order matches input order
    pub fn embed_many(&self, texts: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        if batch_size == 0 {
            return Err(IndexError::invalid_config("batch size must be positive"));
        }
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let normalized: Vec<&str> = texts.iter().map(|t| normalize(t)).collect();

        // Unique texts not in the cache, in first-seen order
        let mut pending: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for text in &normalized {
            if !self.cache.contains_key(*text) && seen.insert(*text) {
                pending.push(text.to_string());
            }
        }

        if !pending.is_empty() {
            let model = self.load()?;
            for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
                let vectors = model
                    .encode(batch)
                    .map_err(|e| with_operation(e, &format!("encode batch {}", batch_index)))?;
                if vectors.len() != batch.len() {
                    return Err(IndexError::backend(
                        format!("encode batch {}", batch_index),
                        format!("expected {} vectors, got {}", batch.len(), vectors.len()),
                    ));
                }
                for (text, vector) in batch.iter().zip(vectors) {
                    self.cache.insert(text.clone(), vector);
                }
                log::debug!(
                    "Encoded batch {} ({} texts)",
                    batch_index,
                    batch.len()
                );
            }
        }

        normalized
            .iter()
            .map(|text| {
                self.cache.get(*text).map(|v| v.clone()).ok_or_else(|| {
                    IndexError::backend("encode", format!("missing vector for text {:?}", text))
                })
            })
            .collect()
    }

    /// Cosine similarity between two embeddings
    pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    /// Get cache size
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn normalize(text: &str) -> &str {
    if text.is_empty() {
        EMPTY_TEXT_SUBSTITUTE
    } else {
        text
    }
}

/// Tag a backend failure with the operation that triggered it
fn with_operation(err: IndexError, operation: &str) -> IndexError {
    match err {
        IndexError::Backend { operation: inner, message } => {
            IndexError::backend(format!("{} ({})", operation, inner), message)
        }
        other => other,
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::{FailingLoader, HashingLoader};

    fn generator(loader: &HashingLoader) -> EmbeddingGenerator {
        EmbeddingGenerator::with_loader(EmbeddingConfig::default(), Arc::new(loader.clone()))
            .unwrap()
    }

    #[test]
    fn test_model_loaded_lazily_once() {
        let loader = HashingLoader::new(16);
        let gen = generator(&loader);
        assert!(!gen.is_loaded());
        assert_eq!(loader.loads(), 0);

        gen.embed_one("first").unwrap();
        gen.embed_one("second").unwrap();
        gen.embed_many(&["third".to_string()], 4).unwrap();

        assert!(gen.is_loaded());
        assert_eq!(loader.loads(), 1);
    }

    #[test]
    fn test_empty_text_gets_full_dimension_vector() {
        let loader = HashingLoader::new(16);
        let gen = generator(&loader);
        let empty = gen.embed_one("").unwrap();
        let space = gen.embed_one(" ").unwrap();
        assert_eq!(empty.len(), 16);
        assert_eq!(empty, space);
        assert!(empty.iter().any(|x| *x != 0.0));
    }

    #[test]
    fn test_batch_size_does_not_change_output() {
        let texts: Vec<String> = (0..10)
            .map(|i| format!("контроль номер {} остатки", i))
            .chain(std::iter::once(String::new()))
            .collect();

        let a = generator(&HashingLoader::new(32)).embed_many(&texts, 1).unwrap();
        let b = generator(&HashingLoader::new(32)).embed_many(&texts, 3).unwrap();
        let c = generator(&HashingLoader::new(32)).embed_many(&texts, 100).unwrap();

        assert_eq!(a.len(), texts.len());
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_batch_order_matches_single_embeddings() {
        let loader = HashingLoader::new(32);
        let gen = generator(&loader);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let batch = gen.embed_many(&texts, 2).unwrap();

        let single = generator(&HashingLoader::new(32));
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&single.embed_one(text).unwrap(), vector);
        }
        assert_eq!(batch[0], batch[2]);
        assert_eq!(gen.cache_size(), 2);
    }

    #[test]
    fn test_set_model_locked_after_load() {
        let loader = HashingLoader::new(8);
        let mut gen = generator(&loader);

        gen.set_model_name("all-MiniLM-L6-v2").unwrap();
        assert_eq!(gen.model_name(), "all-MiniLM-L6-v2");

        gen.embed_one("load now").unwrap();
        let result = gen.set_model_name(DEFAULT_MODEL);
        assert!(matches!(result, Err(IndexError::ConfigurationLocked(_))));
        assert_eq!(gen.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_reinitialize_reloads_model() {
        let loader = HashingLoader::new(8);
        let mut gen = generator(&loader);
        gen.embed_one("x").unwrap();

        gen.reinitialize(EmbeddingConfig::default().with_model("other"))
            .unwrap();
        assert!(!gen.is_loaded());
        assert_eq!(gen.cache_size(), 0);

        gen.embed_one("x").unwrap();
        assert_eq!(loader.loads(), 2);
        assert_eq!(loader.last_model().as_deref(), Some("other"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EmbeddingConfig::default().with_batch_size(0);
        let result = EmbeddingGenerator::with_loader(config, Arc::new(HashingLoader::new(8)));
        assert!(matches!(result, Err(IndexError::InvalidConfig(_))));

        let gen = generator(&HashingLoader::new(8));
        assert!(matches!(
            gen.embed_many(&["a".to_string()], 0),
            Err(IndexError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_failure_is_backend_error() {
        let gen =
            EmbeddingGenerator::with_loader(EmbeddingConfig::default(), Arc::new(FailingLoader))
                .unwrap();
        let err = gen.embed_one("text").unwrap_err();
        assert!(err.is_backend());
        assert!(!gen.is_loaded());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0_f32, 0.0, 0.0];
        let b = [0.0_f32, 1.0, 0.0];
        assert!((EmbeddingGenerator::similarity(&a, &a) - 1.0).abs() < 0.0001);
        assert!(EmbeddingGenerator::similarity(&a, &b).abs() < 0.0001);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }
}
