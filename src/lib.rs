//! # BoardCanon
//!
//! Snowboard identity resolution: reduces messy, multi-source product records
//! (retailer listings, manufacturer catalogs, review sites, LLM lookups) to one
//! canonical board per physical product, keyed `brand|model|gender`.
//!
//! Records flow through brand canonicalization and model normalization into a
//! [`BoardKey`], are coalesced in batches or ingested incrementally by source
//! priority, and land in a [`CatalogStore`] with per-field provenance.

pub mod brand;
pub mod coalesce;
pub mod config;
pub mod enrichment;
pub mod filter;
pub mod identity;
pub mod ingest;
pub mod key;
pub mod model;
pub mod normalize;
pub mod persistence;
pub mod store;

// Re-export main types for convenience
pub use coalesce::{identify_boards, BoardGroup, FieldDisagreement};
pub use config::{BoardCanonConfig, ConfigError};
pub use enrichment::{EnrichmentCache, SpecLookup, SpecPatch};
pub use filter::BoardFilter;
pub use identity::{BoardIdentifier, IdentityInput};
pub use ingest::{IngestOutcome, IngestReport, SpecRecord};
pub use key::BoardKey;
pub use model::{
    Board, BoardRow, BoardSpecs, BrandIdentifier, Condition, Gender, Listing, ScrapedBoard,
    SearchRun, SourceTier, SpecSource,
};
pub use normalize::{NormalizeOptions, Normalizer, RuleTable};
pub use persistence::PersistentStore;
pub use store::{CatalogStore, CommitReport, IntegrityError, Store};

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

/// Main API: rules, configuration and a catalog store.
pub struct BoardCanon {
    store: Box<dyn CatalogStore>,
    normalizer: Normalizer,
    config: BoardCanonConfig,
}

impl BoardCanon {
    /// Built-in rules over an in-memory store.
    pub fn new() -> Result<Self> {
        Self::with_store(BoardCanonConfig::default(), Store::new())
    }

    /// Create an instance with a custom store implementation.
    pub fn with_store<S>(config: BoardCanonConfig, store: S) -> Result<Self>
    where
        S: CatalogStore + 'static,
    {
        let normalizer = build_normalizer(&config)?;
        Ok(Self {
            store: Box::new(store),
            normalizer,
            config,
        })
    }

    /// Open the RocksDB catalog at `config.storage.path`.
    pub fn open(config: BoardCanonConfig) -> Result<Self> {
        let store = PersistentStore::open_with_options(&config.storage.path, config.open_options())?;
        Self::with_store(config, store)
    }

    pub fn config(&self) -> &BoardCanonConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn CatalogStore {
        self.store.as_mut()
    }

    /// Normalized model name for `raw` under the configured rules.
    pub fn normalize(&self, raw: &str, brand: Option<&str>) -> String {
        let brand = brand.map(brand::canonicalize);
        self.normalizer
            .normalize(raw, brand.as_ref(), self.normalizer.defaults())
    }

    /// Coalesce one batch of scraped records. Pure; nothing is written.
    pub fn identify_boards(&self, records: &[ScrapedBoard]) -> BTreeMap<BoardKey, BoardGroup> {
        coalesce::identify_boards(records, &self.normalizer)
    }

    /// Apply spec deliveries to the boards cache by source priority.
    pub fn ingest(&mut self, records: &[SpecRecord]) -> Result<IngestReport> {
        ingest::ingest(self.store.as_mut(), records, &self.normalizer)
    }

    /// Persist a coalesced batch under `run`.
    pub fn commit_run(
        &mut self,
        run: &SearchRun,
        groups: &BTreeMap<BoardKey, BoardGroup>,
    ) -> Result<CommitReport> {
        store::commit_run(self.store.as_mut(), run, groups)
    }

    /// Coalesce `records` and commit them as a new search run.
    pub fn run_batch(
        &mut self,
        label: &str,
        records: &[ScrapedBoard],
    ) -> Result<(SearchRun, CommitReport)> {
        let run = SearchRun::new(label);
        let groups = self.identify_boards(records);
        let report = self.commit_run(&run, &groups)?;
        Ok((run, report))
    }

    /// A stored board with its listings.
    pub fn board(&self, key: &BoardKey) -> Result<Option<Board>> {
        let Some(row) = self.store.get_board(key)? else {
            return Ok(None);
        };
        let listings = self
            .store
            .listings_for_board(key)?
            .into_iter()
            .map(|stored| stored.listing)
            .collect();
        Ok(Some(row.into_board(listings)))
    }

    /// Stored boards passing `filter`, ordered by key.
    pub fn search(&self, filter: &BoardFilter) -> Result<Vec<Board>> {
        let mut boards = Vec::new();
        for row in self.store.boards()? {
            let key = row.board_key.clone();
            let listings = self
                .store
                .listings_for_board(&key)?
                .into_iter()
                .map(|stored| stored.listing)
                .collect();
            let board = row.into_board(listings);
            if filter.matches(&board) {
                boards.push(board);
            }
        }
        Ok(boards)
    }

    pub fn disagreements(&self, key: &BoardKey) -> Result<Vec<FieldDisagreement>> {
        ingest::disagreements(self.store.as_ref(), key)
    }

    /// An enrichment cache over `source`, sized by `config.enrichment`.
    pub fn enrichment_cache<L: SpecLookup>(&self, source: L) -> EnrichmentCache<L> {
        EnrichmentCache::new(source, self.config.enrichment.cache_capacity)
    }

    /// Look up each stored board in `keys` and ingest the hits at their own tier.
    /// Keys with no stored row are skipped.
    pub fn enrich<L: SpecLookup>(
        &mut self,
        cache: &EnrichmentCache<L>,
        keys: &[BoardKey],
    ) -> Result<IngestReport> {
        let mut records = Vec::new();
        for key in keys {
            let Some(row) = self.store.get_board(key)? else {
                debug!("Skipping enrichment for unknown board {}", key);
                continue;
            };
            if let Some(patch) = cache.lookup(key) {
                records.push(patch.into_record(&row));
            }
        }
        self.ingest(&records)
    }
}

fn build_normalizer(config: &BoardCanonConfig) -> Result<Normalizer> {
    let mut table = RuleTable::builtin()?;
    if let Some(path) = &config.normalizer.rules_path {
        debug!("Loading normalization rules from {}", path.display());
        table = table.merge(RuleTable::from_path(path)?);
    }
    Ok(Normalizer::new(&table)?.with_defaults(config.normalize_options()))
}
