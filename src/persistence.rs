//! # Persistence
//!
//! RocksDB-backed catalog store. Each table lives in its own column family with
//! bincode values; the metadata family carries a storage manifest and the
//! provenance sequence counter.

use crate::config::STORAGE_FORMAT_VERSION;
use crate::key::BoardKey;
use crate::model::{BoardRow, Listing, RunId, SearchRun, SpecSource};
use crate::store::{check_listing_refs, CatalogStore, StoredListing};
use anyhow::{anyhow, Result};
use lru::LruCache;
use rocksdb::{
    checkpoint::Checkpoint, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch,
    DB,
};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

const CF_RUNS: &str = "runs";
const CF_BOARDS: &str = "boards";
const CF_LISTINGS: &str = "listings";
const CF_SPEC_SOURCES: &str = "spec_sources";
const CF_METADATA: &str = "metadata";

const KEY_MANIFEST: &[u8] = b"manifest";
const KEY_NEXT_SPEC_SOURCE_SEQ: &[u8] = b"next_spec_source_seq";

/// Separates the board key from the sequence number in provenance keys.
const KEY_TERMINATOR: u8 = 0;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StorageManifest {
    format_version: u32,
    app_version: String,
}

pub struct PersistentStore {
    db: DB,
    board_cache: Mutex<LruCache<BoardKey, BoardRow>>,
    next_spec_source_seq: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct PersistentOpenOptions {
    pub repair: bool,
    pub board_cache_capacity: usize,
}

impl Default for PersistentOpenOptions {
    fn default() -> Self {
        Self {
            repair: false,
            board_cache_capacity: crate::config::DEFAULT_BOARD_CACHE_CAPACITY,
        }
    }
}

impl PersistentStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, PersistentOpenOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: PersistentOpenOptions,
    ) -> Result<Self> {
        if options.repair {
            repair_db(path.as_ref())?;
        }
        let db = open_db(path)?;
        validate_or_init_manifest(&db)?;
        let next_spec_source_seq = load_metadata::<u64>(&db, KEY_NEXT_SPEC_SOURCE_SEQ)?.unwrap_or(0);
        let capacity = NonZeroUsize::new(options.board_cache_capacity)
            .ok_or_else(|| anyhow!("board cache capacity must be positive"))?;

        Ok(Self {
            db,
            board_cache: Mutex::new(LruCache::new(capacity)),
            next_spec_source_seq,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Write a consistent, openable copy of the catalog to `path`, which must not exist.
    pub fn checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        let checkpoint = Checkpoint::new(&self.db)?;
        checkpoint.create_checkpoint(path)?;
        Ok(())
    }

    /// Drop every table's rows, keeping the manifest.
    pub fn reset_data(&mut self) -> Result<()> {
        clear_cf(&self.db, CF_RUNS)?;
        clear_cf(&self.db, CF_BOARDS)?;
        clear_cf(&self.db, CF_LISTINGS)?;
        clear_cf(&self.db, CF_SPEC_SOURCES)?;
        remove_metadata_key(&self.db, KEY_NEXT_SPEC_SOURCE_SEQ)?;
        self.next_spec_source_seq = 0;
        if let Ok(mut cache) = self.board_cache.lock() {
            cache.clear();
        }
        Ok(())
    }

    fn put<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow!("missing {cf_name} column family"))?;
        let bytes = bincode::serialize(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow!("missing {cf_name} column family"))?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow!("missing {cf_name} column family"))?;
        let mut values = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = entry?;
            values.push(bincode::deserialize(&value)?);
        }
        Ok(values)
    }
}

impl CatalogStore for PersistentStore {
    fn insert_run(&mut self, run: &SearchRun) -> Result<()> {
        self.put(CF_RUNS, run.id.0.as_bytes(), run)
    }

    fn get_run(&self, id: &RunId) -> Result<Option<SearchRun>> {
        self.get(CF_RUNS, id.0.as_bytes())
    }

    fn upsert_board(&mut self, row: BoardRow) -> Result<()> {
        self.put(CF_BOARDS, row.board_key.as_str().as_bytes(), &row)?;
        if let Ok(mut cache) = self.board_cache.lock() {
            cache.put(row.board_key.clone(), row);
        }
        Ok(())
    }

    fn get_board(&self, key: &BoardKey) -> Result<Option<BoardRow>> {
        if let Ok(mut cache) = self.board_cache.lock() {
            if let Some(row) = cache.get(key) {
                return Ok(Some(row.clone()));
            }
        }
        let row: Option<BoardRow> = self.get(CF_BOARDS, key.as_str().as_bytes())?;
        if let Some(row) = &row {
            if let Ok(mut cache) = self.board_cache.lock() {
                cache.put(key.clone(), row.clone());
            }
        }
        Ok(row)
    }

    fn boards(&self) -> Result<Vec<BoardRow>> {
        self.scan(CF_BOARDS)
    }

    fn insert_listing(&mut self, run_id: &RunId, listing: Listing) -> Result<()> {
        check_listing_refs(&*self, run_id, &listing)?;
        let key = listing.id.clone();
        let stored = StoredListing {
            run_id: run_id.clone(),
            listing,
        };
        self.put(CF_LISTINGS, key.as_bytes(), &stored)
    }

    fn listings_for_board(&self, key: &BoardKey) -> Result<Vec<StoredListing>> {
        let listings: Vec<StoredListing> = self.scan(CF_LISTINGS)?;
        Ok(listings
            .into_iter()
            .filter(|stored| stored.listing.board_key == key.as_str())
            .collect())
    }

    fn append_spec_source(&mut self, source: SpecSource) -> Result<()> {
        let seq = self.next_spec_source_seq;
        let key = encode_spec_source_key(&source.board_key, seq);
        let spec_cf = self
            .db
            .cf_handle(CF_SPEC_SOURCES)
            .ok_or_else(|| anyhow!("missing spec_sources column family"))?;
        let metadata_cf = self
            .db
            .cf_handle(CF_METADATA)
            .ok_or_else(|| anyhow!("missing metadata column family"))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(spec_cf, key, bincode::serialize(&source)?);
        batch.put_cf(metadata_cf, KEY_NEXT_SPEC_SOURCE_SEQ, bincode::serialize(&(seq + 1))?);
        self.db.write(batch)?;
        self.next_spec_source_seq = seq + 1;
        Ok(())
    }

    fn spec_sources_for(&self, key: &BoardKey) -> Result<Vec<SpecSource>> {
        let cf = self
            .db
            .cf_handle(CF_SPEC_SOURCES)
            .ok_or_else(|| anyhow!("missing spec_sources column family"))?;
        let prefix = encode_spec_source_prefix(key);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        let mut sources = Vec::new();
        for entry in iter {
            let (entry_key, value) = entry?;
            if !entry_key.starts_with(&prefix) {
                break;
            }
            sources.push(bincode::deserialize(&value)?);
        }
        Ok(sources)
    }
}

impl Drop for PersistentStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn open_db(path: impl AsRef<Path>) -> Result<DB> {
    let mut options = Options::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_paranoid_checks(true);
    let cfs = vec![
        ColumnFamilyDescriptor::new(CF_RUNS, Options::default()),
        ColumnFamilyDescriptor::new(CF_BOARDS, Options::default()),
        ColumnFamilyDescriptor::new(CF_LISTINGS, Options::default()),
        ColumnFamilyDescriptor::new(CF_SPEC_SOURCES, Options::default()),
        ColumnFamilyDescriptor::new(CF_METADATA, Options::default()),
    ];
    Ok(DB::open_cf_descriptors(&options, path, cfs)?)
}

fn encode_spec_source_prefix(key: &BoardKey) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(key.as_str().len() + 1);
    prefix.extend_from_slice(key.as_str().as_bytes());
    prefix.push(KEY_TERMINATOR);
    prefix
}

fn encode_spec_source_key(key: &BoardKey, seq: u64) -> Vec<u8> {
    let mut encoded = encode_spec_source_prefix(key);
    encoded.extend_from_slice(&seq.to_be_bytes());
    encoded
}

fn repair_db(path: &Path) -> Result<()> {
    let mut options = Options::default();
    options.create_if_missing(true);
    DB::repair(&options, path)?;
    Ok(())
}

fn validate_or_init_manifest(db: &DB) -> Result<()> {
    let metadata_cf = db
        .cf_handle(CF_METADATA)
        .ok_or_else(|| anyhow!("missing metadata column family"))?;
    if let Some(bytes) = db.get_cf(metadata_cf, KEY_MANIFEST)? {
        let manifest: StorageManifest = bincode::deserialize(&bytes)?;
        if manifest.format_version != STORAGE_FORMAT_VERSION {
            return Err(anyhow!(
                "storage format version mismatch: expected {}, found {}",
                STORAGE_FORMAT_VERSION,
                manifest.format_version
            ));
        }
        return Ok(());
    }

    let manifest = StorageManifest {
        format_version: STORAGE_FORMAT_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let bytes = bincode::serialize(&manifest)?;
    db.put_cf(metadata_cf, KEY_MANIFEST, bytes)?;
    Ok(())
}

fn load_metadata<T: serde::de::DeserializeOwned>(db: &DB, key: &[u8]) -> Result<Option<T>> {
    let metadata_cf = db
        .cf_handle(CF_METADATA)
        .ok_or_else(|| anyhow!("missing metadata column family"))?;
    if let Some(bytes) = db.get_cf(metadata_cf, key)? {
        Ok(Some(bincode::deserialize(&bytes)?))
    } else {
        Ok(None)
    }
}

fn clear_cf(db: &DB, cf_name: &str) -> Result<()> {
    let cf = db
        .cf_handle(cf_name)
        .ok_or_else(|| anyhow!("missing column family {cf_name}"))?;
    let keys: Vec<Vec<u8>> = db
        .iterator_cf(cf, IteratorMode::Start)
        .map(|entry| entry.map(|(key, _)| key.to_vec()))
        .collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Ok(());
    }
    let mut batch = WriteBatch::default();
    for key in keys {
        batch.delete_cf(cf, key);
    }
    db.write(batch)?;
    Ok(())
}

fn remove_metadata_key(db: &DB, key: &[u8]) -> Result<()> {
    let metadata_cf = db
        .cf_handle(CF_METADATA)
        .ok_or_else(|| anyhow!("missing metadata column family"))?;
    db.delete_cf(metadata_cf, key)?;
    Ok(())
}
