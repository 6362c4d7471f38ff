//! # Enrichment Cache
//!
//! Spec lookups against slow or unreliable sources (LLM, review sites) sit behind
//! [`SpecLookup`]. [`EnrichmentCache`] keeps confirmed hits in an LRU cache; misses
//! and failures are not remembered, so the next run asks again.

use crate::ingest::SpecRecord;
use crate::key::BoardKey;
use crate::model::{BoardRow, BoardSpecs, SourceTier};
use anyhow::Result;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Spec fields found for one board by an enrichment source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecPatch {
    pub tier: SourceTier,
    #[serde(default)]
    pub specs: BoardSpecs,
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl SpecPatch {
    pub fn new(tier: SourceTier, specs: BoardSpecs) -> Self {
        Self {
            tier,
            specs,
            extras: BTreeMap::new(),
            source_url: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.specs.field_values().is_empty() && self.extras.is_empty()
    }

    /// The patch as a spec delivery for the stored board `row`.
    pub fn into_record(self, row: &BoardRow) -> SpecRecord {
        SpecRecord {
            brand: row.brand.clone(),
            model: row.model.clone(),
            gender_hint: Some(row.gender),
            tier: self.tier,
            source_url: self.source_url,
            specs: self.specs,
            extras: self.extras,
        }
    }
}

/// A source that may know specs for a board.
///
/// `Ok(None)` means the source answered and has nothing; `Err` means it could not
/// answer. Both are retried on the next lookup.
pub trait SpecLookup: Send + Sync {
    fn lookup(&self, key: &BoardKey) -> Result<Option<SpecPatch>>;
}

impl<F> SpecLookup for F
where
    F: Fn(&BoardKey) -> Result<Option<SpecPatch>> + Send + Sync,
{
    fn lookup(&self, key: &BoardKey) -> Result<Option<SpecPatch>> {
        self(key)
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

pub struct EnrichmentCache<L: SpecLookup> {
    source: L,
    cache: Mutex<LruCache<BoardKey, SpecPatch>>,
    stats: Mutex<EnrichmentStats>,
}

impl<L: SpecLookup> EnrichmentCache<L> {
    pub fn new(source: L, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            cache: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(EnrichmentStats::default()),
        }
    }

    pub fn lookup(&self, key: &BoardKey) -> Option<SpecPatch> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(key) {
                self.bump(|stats| stats.hits += 1);
                return Some(hit.clone());
            }
        }

        match self.source.lookup(key) {
            Ok(Some(patch)) if !patch.is_empty() => {
                debug!("Enrichment hit for {}", key);
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(key.clone(), patch.clone());
                }
                self.bump(|stats| stats.misses += 1);
                Some(patch)
            }
            Ok(_) => {
                self.bump(|stats| stats.misses += 1);
                None
            }
            Err(err) => {
                warn!("Enrichment lookup failed for {}: {:#}", key, err);
                self.bump(|stats| stats.errors += 1);
                None
            }
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> EnrichmentStats {
        self.stats.lock().map(|stats| *stats).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn bump(&self, update: impl FnOnce(&mut EnrichmentStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }
}
