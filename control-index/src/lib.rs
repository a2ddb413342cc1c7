//! Control Index
//!
//! Extracts validation controls from spreadsheet XML exports and keeps a
//! persistent semantic index over them.
//!
//! ## Features
//!
//! - **Namespace-tolerant extraction** - Current, legacy and unqualified spreadsheet markup
//! - **Lazy embeddings** - fastembed sentence models loaded on first use, frozen afterwards
//! - **RocksDB persistence** - One column family per collection, chunked writes
//! - **Nearest-neighbour search** - Exact cosine scan for small collections, HNSW above that
//!
//! ## Example
//!
//! ```ignore
//! use control_index::{extract, ControlIndex, EmbeddingConfig, EmbeddingGenerator, IndexConfig, LogProgress};
//!
//! let controls = extract("Template.xml")?;
//!
//! let generator = EmbeddingGenerator::new(EmbeddingConfig::default())?;
//! let mut index = ControlIndex::new(IndexConfig::default(), generator)?;
//! index.rebuild(&controls, &mut LogProgress)?;
//!
//! for hit in index.search("остатки по счетам", 5)? {
//!     println!("{:.3} {}", hit.distance, hit.identifier());
//! }
//! ```

pub mod control;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod filter;
pub mod index;
pub mod progress;
pub mod search;
pub mod storage;

// Re-exports for convenience
pub use control::{find_by_identifier, parse_flag, Control, ControlBuilder, ControlField};
pub use embedding::{EmbeddingConfig, EmbeddingGenerator};
pub use error::{IndexError, Result};
pub use extract::{extract, extract_str};
pub use filter::{distinct_values, ControlFilter};
pub use index::{ControlIndex, IndexConfig, SearchResult};
pub use progress::{LogProgress, NoProgress, Progress};
