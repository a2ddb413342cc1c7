//! Embedding module for semantic search
//!
//! Uses fastembed (ONNX runtime) sentence models behind a lazily loaded generator.

mod backend;
mod discovery;
mod generator;
mod onnx;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{EmbeddingBackend, ModelLoader};
pub use discovery::{find_model_cache_dir, MODELS_PATH_ENV};
pub use generator::{cosine_similarity, EmbeddingConfig, EmbeddingGenerator, DEFAULT_MODEL};
pub use onnx::{resolve_model, FastEmbedBackend, FastEmbedLoader, ResolvedModel};
