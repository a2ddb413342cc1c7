//! RocksDB collection storage
//!
//! One database per storage path; each named collection is a column family.
//! Within a collection, `doc:<id>` holds the entry (source text + metadata)
//! and `vec:<id>` holds its embedding, both bincode-encoded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

const CF_PREFIX: &str = "collection:";
const INFO_KEY: &[u8] = b"_info";
const DOC_PREFIX: &str = "doc:";
const VEC_PREFIX: &str = "vec:";

/// Collection header written on creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Vector dimension of the entries
    pub dimension: usize,
}

/// One persisted entry (vector stored separately)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    /// Position in the rebuild input
    pub position: u64,
    /// Text the vector was computed from
    pub document: String,
    pub metadata: BTreeMap<String, String>,
}

/// Entry plus its vector, as written and loaded
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedEntry {
    pub entry: StoredEntry,
    pub vector: Vec<f32>,
}

/// Collection-aware handle on a RocksDB database
pub struct CollectionStore {
    db: DB,
    path: PathBuf,
}

fn cf_name(collection: &str) -> String {
    format!("{}{}", CF_PREFIX, collection)
}

impl CollectionStore {
    /// Open (creating if missing) the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        // A fresh directory has no column family list yet
        let cfs = if path.join("CURRENT").exists() {
            DB::list_cf(&opts, path)?
        } else {
            vec![rocksdb::DEFAULT_COLUMN_FAMILY_NAME.to_string()]
        };

        let db = DB::open_cf(&opts, path, &cfs)?;
        log::info!(
            "CollectionStore opened at: {} ({} collections)",
            path.display(),
            cfs.iter().filter(|n| n.starts_with(CF_PREFIX)).count()
        );

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.db.cf_handle(&cf_name(name)).is_some()
    }

    /// Names of all collections in this database
    pub fn collections(&self) -> Result<Vec<String>> {
        let opts = Options::default();
        let names = DB::list_cf(&opts, &self.path)?;
        Ok(names
            .into_iter()
            .filter_map(|n| n.strip_prefix(CF_PREFIX).map(str::to_string))
            .collect())
    }

    /// Create an empty collection. Fails if it already exists.
    pub fn create_collection(
        &self,
        name: &str,
        description: &str,
        dimension: usize,
    ) -> Result<CollectionInfo> {
        if self.has_collection(name) {
            return Err(IndexError::backend(
                "create collection",
                format!("collection {} already exists", name),
            ));
        }

        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        self.db.create_cf(cf_name(name), &opts)?;

        let info = CollectionInfo {
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            dimension,
        };
        let cf = self.handle(name)?;
        self.db.put_cf(&cf, INFO_KEY, bincode::serialize(&info)?)?;
        self.db.flush_cf(&cf)?;

        log::info!("Created collection {}", name);
        Ok(info)
    }

    /// Drop a collection. Returns false when there was nothing to drop.
    pub fn drop_collection(&self, name: &str) -> Result<bool> {
        if !self.has_collection(name) {
            return Ok(false);
        }
        self.db.drop_cf(&cf_name(name))?;
        log::info!("Dropped collection {}", name);
        Ok(true)
    }

    pub fn info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let cf = self.handle(name)?;
        match self.db.get_cf(&cf, INFO_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a chunk of entries atomically
    pub fn add(&self, name: &str, entries: &[EmbeddedEntry]) -> Result<()> {
        let cf = self.handle(name)?;
        let mut batch = WriteBatch::default();
        for e in entries {
            let id = &e.entry.id;
            batch.put_cf(
                &cf,
                format!("{}{}", DOC_PREFIX, id),
                bincode::serialize(&e.entry)?,
            );
            batch.put_cf(
                &cf,
                format!("{}{}", VEC_PREFIX, id),
                bincode::serialize(&e.vector)?,
            );
        }
        self.db.write(batch)?;
        self.db.flush_cf(&cf)?;
        Ok(())
    }

    /// Number of entries in a collection
    pub fn count(&self, name: &str) -> Result<usize> {
        let cf = self.handle(name)?;
        let mut count = 0;
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(DOC_PREFIX.as_bytes(), Direction::Forward),
        );
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(DOC_PREFIX.as_bytes()) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Load every entry with its vector, ordered by position.
    ///
    /// Entries that fail to decode or have no vector are skipped with a warning.
    pub fn load(&self, name: &str) -> Result<Vec<EmbeddedEntry>> {
        let cf = self.handle(name)?;
        let mut entries = Vec::new();
        let mut skipped = 0;

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(DOC_PREFIX.as_bytes(), Direction::Forward),
        );
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(DOC_PREFIX.as_bytes()) {
                break;
            }
            let id = String::from_utf8_lossy(&key[DOC_PREFIX.len()..]).into_owned();

            let entry = match bincode::deserialize::<StoredEntry>(&value) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to deserialize entry {}: {}. Skipping.", id, e);
                    skipped += 1;
                    continue;
                }
            };

            let vector = self
                .db
                .get_cf(&cf, format!("{}{}", VEC_PREFIX, id))?
                .and_then(|bytes| bincode::deserialize::<Vec<f32>>(&bytes).ok());
            match vector {
                Some(vector) => entries.push(EmbeddedEntry { entry, vector }),
                None => {
                    log::warn!("Missing vector for entry {}. Skipping.", id);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} entries in collection {}", skipped, name);
        }

        entries.sort_by_key(|e| e.entry.position);
        Ok(entries)
    }

    fn handle(&self, name: &str) -> Result<std::sync::Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(&cf_name(name))
            .ok_or_else(|| IndexError::not_found(format!("collection {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, position: u64) -> EmbeddedEntry {
        let mut metadata = BTreeMap::new();
        metadata.insert("identifier".to_string(), id.to_string());
        EmbeddedEntry {
            entry: StoredEntry {
                id: id.to_string(),
                position,
                document: format!("Идентификатор: {}", id),
                metadata,
            },
            vector: vec![position as f32, 1.0],
        }
    }

    #[test]
    fn test_create_add_count_load() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::open(dir.path()).unwrap();

        assert!(!store.has_collection("controls"));
        let info = store.create_collection("controls", "test", 2).unwrap();
        assert_eq!(info.name, "controls");
        assert_eq!(store.count("controls").unwrap(), 0);

        store
            .add("controls", &[entry("b", 1), entry("a", 0)])
            .unwrap();
        store.add("controls", &[entry("c", 2)]).unwrap();

        assert_eq!(store.count("controls").unwrap(), 3);
        let loaded = store.load("controls").unwrap();
        let ids: Vec<&str> = loaded.iter().map(|e| e.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(loaded[1].vector, vec![1.0, 1.0]);
        let info = store.info("controls").unwrap().unwrap();
        assert_eq!(info.description, "test");
        assert_eq!(info.dimension, 2);
    }

    #[test]
    fn test_drop_missing_collection_is_not_error() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::open(dir.path()).unwrap();
        assert!(!store.drop_collection("controls").unwrap());

        store.create_collection("controls", "", 2).unwrap();
        assert!(store.drop_collection("controls").unwrap());
        assert!(!store.has_collection("controls"));
    }

    #[test]
    fn test_create_existing_collection_fails() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::open(dir.path()).unwrap();
        store.create_collection("controls", "", 2).unwrap();
        assert!(store.create_collection("controls", "", 2).is_err());
    }

    #[test]
    fn test_collections_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = CollectionStore::open(dir.path()).unwrap();
            store.create_collection("controls", "", 2).unwrap();
            store.create_collection("other", "", 2).unwrap();
            store.add("controls", &[entry("a", 0)]).unwrap();
        }

        let store = CollectionStore::open(dir.path()).unwrap();
        let mut names = store.collections().unwrap();
        names.sort();
        assert_eq!(names, vec!["controls", "other"]);
        assert_eq!(store.count("controls").unwrap(), 1);
        assert_eq!(store.count("other").unwrap(), 0);
    }

    #[test]
    fn test_missing_collection_operations_not_found() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.count("nope"),
            Err(IndexError::NotFound(_))
        ));
    }
}
