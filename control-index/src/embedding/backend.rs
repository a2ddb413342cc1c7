//! Embedding backend seams

use std::sync::Arc;

use super::generator::EmbeddingConfig;
use crate::error::Result;

/// A loaded embedding model
pub trait EmbeddingBackend: Send + Sync {
    /// Fixed output dimension
    fn dimension(&self) -> usize;

    /// Encode a batch; output order matches input order 1:1
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Acquires the embedding model named by a configuration
pub trait ModelLoader: Send + Sync {
    fn load(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>>;
}
