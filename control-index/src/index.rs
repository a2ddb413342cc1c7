//! Vector index manager
//!
//! Owns the persisted collection of embedded controls: full rebuild from a
//! sequence of records, nearest-neighbour search by text, and entry count.
//!
//! Rebuild loads the model first, then drops the old collection before the
//! new one is populated. A failure while embedding or persisting leaves an
//! empty or partially filled collection behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::control::{Control, ControlBuilderError};
use crate::embedding::EmbeddingGenerator;
use crate::error::{IndexError, Result};
use crate::progress::Progress;
use crate::search::VectorIndex;
use crate::storage::{CollectionStore, EmbeddedEntry, StoredEntry};

/// Index configuration
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Storage directory (default: `controls_db`)
    pub db_path: PathBuf,
    /// Collection name (default: `controls`)
    pub collection_name: String,
    /// Entries per persisted chunk (default: 100)
    pub chunk_size: usize,
    /// Collections up to this size are searched exactly (default: 256)
    pub exact_search_limit: usize,
    /// Description stored with the collection
    pub description: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("controls_db"),
            collection_name: "controls".to_string(),
            chunk_size: 100,
            exact_search_limit: 256,
            description: "Semantic index of validation controls".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_exact_search_limit(mut self, limit: usize) -> Self {
        self.exact_search_limit = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(IndexError::invalid_config("chunk size must be positive"));
        }
        if self.collection_name.trim().is_empty() {
            return Err(IndexError::invalid_config("collection name must not be empty"));
        }
        Ok(())
    }
}

/// One ranked hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    /// Field map of the matched control
    pub metadata: BTreeMap<String, String>,
    /// Text the stored vector was computed from
    pub document: String,
    /// 1 - cosine similarity; smaller is closer
    pub distance: f32,
}

impl SearchResult {
    pub fn identifier(&self) -> &str {
        self.metadata
            .get("identifier")
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Rebuild the matched control from its metadata
    pub fn control(&self) -> std::result::Result<Control, ControlBuilderError> {
        Control::from_metadata(&self.metadata)
    }
}

/// Entry id for the record at `position`
pub fn entry_id(position: usize, identifier: &str) -> String {
    if identifier.is_empty() {
        format!("control_{}", position)
    } else {
        format!("control_{}_{}", position, identifier)
    }
}

/// Collection contents held in memory between searches
struct LoadedCollection {
    entries: Vec<StoredEntry>,
    dimension: usize,
    index: VectorIndex,
}

/// Persistent semantic index over controls
pub struct ControlIndex {
    config: IndexConfig,
    generator: EmbeddingGenerator,
    store: Option<CollectionStore>,
    loaded: Option<LoadedCollection>,
}

impl ControlIndex {
    /// Create an index manager. Storage is opened on first use.
    pub fn new(config: IndexConfig, generator: EmbeddingGenerator) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            store: None,
            loaded: None,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn generator(&self) -> &EmbeddingGenerator {
        &self.generator
    }

    /// Mutable access, e.g. to re-initialize the model
    pub fn generator_mut(&mut self) -> &mut EmbeddingGenerator {
        self.loaded = None;
        &mut self.generator
    }

    /// Replace the collection with embeddings of `records`.
    ///
    /// Empty input is rejected before anything is dropped.
    pub fn rebuild(&mut self, records: &[Control], progress: &mut dyn Progress) -> Result<()> {
        if records.is_empty() {
            return Err(IndexError::empty_input("no records to index"));
        }

        let total = records.len();
        let name = self.config.collection_name.as_str();
        progress.progress(0, total, "Preparing collection...");
        self.loaded = None;

        // Model must load before the old collection is touched
        let dimension = self.generator.dimension()?;

        let store = open_store(&mut self.store, &self.config.db_path)?;
        if store
            .drop_collection(name)
            .map_err(|e| e.during("drop collection"))?
        {
            log::info!("Replacing existing collection {}", name);
        }

        store
            .create_collection(name, &self.config.description, dimension)
            .map_err(|e| e.during("create collection"))?;

        let documents: Vec<String> = records.iter().map(Control::embedding_text).collect();
        progress.progress(0, total, "Computing embeddings...");
        let vectors = self
            .generator
            .embed_many(&documents, self.generator.config().batch_size)?;

        progress.progress(0, total, "Saving to database...");
        let mut entries = records
            .iter()
            .zip(documents)
            .zip(vectors)
            .enumerate()
            .map(|(position, ((record, document), vector))| EmbeddedEntry {
                entry: StoredEntry {
                    id: entry_id(position, record.identifier()),
                    position: position as u64,
                    document,
                    metadata: record.to_metadata(),
                },
                vector,
            })
            .peekable();

        let mut persisted = 0;
        let mut chunk_index = 0;
        while entries.peek().is_some() {
            let chunk: Vec<EmbeddedEntry> = entries.by_ref().take(self.config.chunk_size).collect();
            store
                .add(name, &chunk)
                .map_err(|e| e.during(&format!("persist chunk {}", chunk_index)))?;
            persisted += chunk.len();
            log::debug!(
                "Persisted chunk {} ({} entries, {}/{})",
                chunk_index,
                chunk.len(),
                persisted,
                total
            );
            if persisted < total {
                progress.progress(persisted, total, &format!("Saved {} of {}", persisted, total));
            }
            chunk_index += 1;
        }

        log::info!(
            "Rebuilt collection {} with {} entries in {} chunks",
            name,
            persisted,
            chunk_index
        );
        progress.progress(total, total, "Done");
        Ok(())
    }

    /// Up to `top_k` closest entries to `query`, closest first.
    ///
    /// An empty query returns nothing without touching the model.
    pub fn search(&mut self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        self.ensure_loaded()?;
        let loaded = match &self.loaded {
            Some(loaded) if !loaded.entries.is_empty() => loaded,
            _ => return Ok(Vec::new()),
        };

        let query_vector = self.generator.embed_one(query)?;
        if loaded.dimension != 0 && query_vector.len() != loaded.dimension {
            return Err(IndexError::backend(
                "query",
                format!(
                    "query vector has {} dimensions, collection stores {}",
                    query_vector.len(),
                    loaded.dimension
                ),
            ));
        }

        Ok(loaded
            .index
            .search(&query_vector, top_k)
            .into_iter()
            .map(|hit| {
                let entry = &loaded.entries[hit.position];
                SearchResult {
                    id: entry.id.clone(),
                    metadata: entry.metadata.clone(),
                    document: entry.document.clone(),
                    distance: hit.distance,
                }
            })
            .collect())
    }

    /// Number of entries in the collection, creating it empty if missing
    pub fn count(&mut self) -> Result<usize> {
        let store = open_collection(&mut self.store, &self.config)?;
        store
            .count(&self.config.collection_name)
            .map_err(|e| e.during("count"))
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded.is_some() {
            return Ok(());
        }

        let name = self.config.collection_name.as_str();
        let store = open_collection(&mut self.store, &self.config)?;
        let dimension = store
            .info(name)
            .map_err(|e| e.during("query"))?
            .map(|info| info.dimension)
            .unwrap_or(0);
        let (entries, vectors): (Vec<StoredEntry>, Vec<Vec<f32>>) = store
            .load(name)
            .map_err(|e| e.during("query"))?
            .into_iter()
            .map(|e| (e.entry, e.vector))
            .unzip();

        log::info!("Loaded {} entries from collection {}", entries.len(), name);
        self.loaded = Some(LoadedCollection {
            entries,
            dimension,
            index: VectorIndex::build(vectors, self.config.exact_search_limit),
        });
        Ok(())
    }
}

fn open_store<'a>(slot: &'a mut Option<CollectionStore>, path: &Path) -> Result<&'a CollectionStore> {
    let store = match slot.take() {
        Some(store) => store,
        None => CollectionStore::open(path).map_err(|e| e.during("open storage"))?,
    };
    Ok(slot.insert(store))
}

/// Open storage and make sure the configured collection exists
fn open_collection<'a>(
    slot: &'a mut Option<CollectionStore>,
    config: &IndexConfig,
) -> Result<&'a CollectionStore> {
    let store = open_store(slot, &config.db_path)?;
    if !store.has_collection(&config.collection_name) {
        // Dimension is unknown until the first rebuild
        store
            .create_collection(&config.collection_name, &config.description, 0)
            .map_err(|e| e.during("create collection"))?;
    }
    Ok(store)
}
