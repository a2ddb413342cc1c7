//! Deterministic in-process embedding backends for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::backend::{EmbeddingBackend, ModelLoader};
use super::generator::EmbeddingConfig;
use crate::error::{IndexError, Result};

/// Bag-of-words feature hashing, L2-normalized. One extra bias slot keeps
/// token-less input from producing a zero vector.
pub struct HashingBackend {
    dimension: usize,
    encodes: Arc<AtomicUsize>,
}

impl HashingBackend {
    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % (self.dimension as u64 - 1)) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let mut tokens = 0;
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(token)] += 1.0;
            tokens += 1;
        }
        if tokens == 0 {
            vector[self.dimension - 1] = 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        vector.iter_mut().for_each(|x| *x /= norm);
        vector
    }
}

impl EmbeddingBackend for HashingBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Loader for [`HashingBackend`] that counts loads and encode calls
#[derive(Clone)]
pub struct HashingLoader {
    dimension: usize,
    loads: Arc<AtomicUsize>,
    encodes: Arc<AtomicUsize>,
    last_model: Arc<Mutex<Option<String>>>,
}

impl HashingLoader {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension >= 2);
        Self {
            dimension,
            loads: Arc::new(AtomicUsize::new(0)),
            encodes: Arc::new(AtomicUsize::new(0)),
            last_model: Arc::new(Mutex::new(None)),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn last_model(&self) -> Option<String> {
        self.last_model.lock().clone()
    }
}

impl ModelLoader for HashingLoader {
    fn load(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.last_model.lock() = Some(config.model_name.clone());
        Ok(Arc::new(HashingBackend {
            dimension: self.dimension,
            encodes: Arc::clone(&self.encodes),
        }))
    }
}

/// Loader that always fails
pub struct FailingLoader;

impl ModelLoader for FailingLoader {
    fn load(&self, _config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        Err(IndexError::backend("load model", "model files unavailable"))
    }
}
