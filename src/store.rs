//! # Store Module
//!
//! The catalog tables (search runs, boards, listings, spec provenance) behind one
//! trait, with an in-memory implementation. Referential integrity between runs,
//! boards and listings is enforced here, not by callers.

use crate::coalesce::BoardGroup;
use crate::ingest::{decide, IngestOutcome};
use crate::key::BoardKey;
use crate::model::{BoardRow, Listing, RunId, SearchRun, SpecSource};
use anyhow::Result;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use tracing::{debug, instrument};

/// A persisted listing with the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredListing {
    pub run_id: RunId,
    pub listing: Listing,
}

/// Ordering violation between catalog tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// A listing referenced a search run that was never inserted
    MissingRun { run_id: RunId, listing_id: String },
    /// A listing referenced a board that was never written
    MissingBoard { board_key: String, listing_id: String },
    /// A listing had no board assigned
    UnassignedListing { listing_id: String },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::MissingRun { run_id, listing_id } => write!(
                f,
                "listing {} references search run {} which does not exist",
                listing_id, run_id
            ),
            IntegrityError::MissingBoard {
                board_key,
                listing_id,
            } => write!(
                f,
                "listing {} references board {} which does not exist",
                listing_id, board_key
            ),
            IntegrityError::UnassignedListing { listing_id } => {
                write!(f, "listing {} has no board key", listing_id)
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Catalog storage operations shared by the in-memory and on-disk stores.
pub trait CatalogStore: Send {
    fn insert_run(&mut self, run: &SearchRun) -> Result<()>;
    fn get_run(&self, id: &RunId) -> Result<Option<SearchRun>>;
    /// Insert or replace the row for `row.board_key`.
    fn upsert_board(&mut self, row: BoardRow) -> Result<()>;
    fn get_board(&self, key: &BoardKey) -> Result<Option<BoardRow>>;
    /// All board rows ordered by key.
    fn boards(&self) -> Result<Vec<BoardRow>>;
    /// Insert or replace a listing by id. The run and board must already exist.
    fn insert_listing(&mut self, run_id: &RunId, listing: Listing) -> Result<()>;
    fn listings_for_board(&self, key: &BoardKey) -> Result<Vec<StoredListing>>;
    fn append_spec_source(&mut self, source: SpecSource) -> Result<()>;
    /// Provenance rows for a board in insertion order.
    fn spec_sources_for(&self, key: &BoardKey) -> Result<Vec<SpecSource>>;
}

/// In-memory catalog store
#[derive(Debug, Clone, Default)]
pub struct Store {
    runs: HashMap<RunId, SearchRun>,
    boards: BTreeMap<BoardKey, BoardRow>,
    listings: HashMap<String, StoredListing>,
    spec_sources: HashMap<BoardKey, Vec<SpecSource>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board_count(&self) -> usize {
        self.boards.len()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty() && self.listings.is_empty() && self.runs.is_empty()
    }
}

/// Check a listing against the run and board it references.
pub(crate) fn check_listing_refs(
    store: &dyn CatalogStore,
    run_id: &RunId,
    listing: &Listing,
) -> Result<BoardKey> {
    if listing.board_key.is_empty() {
        return Err(IntegrityError::UnassignedListing {
            listing_id: listing.id.clone(),
        }
        .into());
    }
    if store.get_run(run_id)?.is_none() {
        return Err(IntegrityError::MissingRun {
            run_id: run_id.clone(),
            listing_id: listing.id.clone(),
        }
        .into());
    }
    let key = BoardKey::from_stored(&listing.board_key)?;
    if store.get_board(&key)?.is_none() {
        return Err(IntegrityError::MissingBoard {
            board_key: listing.board_key.clone(),
            listing_id: listing.id.clone(),
        }
        .into());
    }
    Ok(key)
}

impl CatalogStore for Store {
    fn insert_run(&mut self, run: &SearchRun) -> Result<()> {
        self.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn get_run(&self, id: &RunId) -> Result<Option<SearchRun>> {
        Ok(self.runs.get(id).cloned())
    }

    fn upsert_board(&mut self, row: BoardRow) -> Result<()> {
        self.boards.insert(row.board_key.clone(), row);
        Ok(())
    }

    fn get_board(&self, key: &BoardKey) -> Result<Option<BoardRow>> {
        Ok(self.boards.get(key).cloned())
    }

    fn boards(&self) -> Result<Vec<BoardRow>> {
        Ok(self.boards.values().cloned().collect())
    }

    fn insert_listing(&mut self, run_id: &RunId, listing: Listing) -> Result<()> {
        check_listing_refs(&*self, run_id, &listing)?;
        self.listings.insert(
            listing.id.clone(),
            StoredListing {
                run_id: run_id.clone(),
                listing,
            },
        );
        Ok(())
    }

    fn listings_for_board(&self, key: &BoardKey) -> Result<Vec<StoredListing>> {
        let mut listings: Vec<StoredListing> = self
            .listings
            .values()
            .filter(|stored| stored.listing.board_key == key.as_str())
            .cloned()
            .collect();
        listings.sort_by(|a, b| a.listing.id.cmp(&b.listing.id));
        Ok(listings)
    }

    fn append_spec_source(&mut self, source: SpecSource) -> Result<()> {
        self.spec_sources
            .entry(source.board_key.clone())
            .or_default()
            .push(source);
        Ok(())
    }

    fn spec_sources_for(&self, key: &BoardKey) -> Result<Vec<SpecSource>> {
        Ok(self.spec_sources.get(key).cloned().unwrap_or_default())
    }
}

/// Combine a cached row with a fresh one. The row that [`decide`] lets through
/// supplies every field it has and the other fills the gaps, so a cached
/// manufacturer row only ever gains fields.
pub fn merge_rows(cached: BoardRow, incoming: BoardRow) -> BoardRow {
    let (mut winner, other) = match decide(Some(cached.spec_source), incoming.spec_source) {
        IngestOutcome::Skipped => (cached, incoming),
        IngestOutcome::Inserted | IngestOutcome::Updated => (incoming, cached),
    };
    winner.specs.fill_missing(&other.specs);
    for (name, value) in other.extras {
        winner.extras.entry(name).or_insert(value);
    }
    winner.updated_at = OffsetDateTime::now_utc();
    winner
}

/// Counts of rows written by [`commit_run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub boards: usize,
    pub listings: usize,
    pub spec_sources: usize,
}

/// Persist one coalesced batch: the run first, then boards, then listings.
#[instrument(skip(store, groups), fields(run = %run.id), level = "debug")]
pub fn commit_run(
    store: &mut dyn CatalogStore,
    run: &SearchRun,
    groups: &BTreeMap<BoardKey, BoardGroup>,
) -> Result<CommitReport> {
    let mut report = CommitReport::default();
    store.insert_run(run)?;

    for (key, group) in groups {
        let row = group.to_row();
        let merged = match store.get_board(key)? {
            Some(cached) => merge_rows(cached, row),
            None => row,
        };
        store.upsert_board(merged)?;
        report.boards += 1;

        for (field, values) in &group.observations {
            for observed in values {
                store.append_spec_source(SpecSource::new(
                    key.clone(),
                    field,
                    observed.tier,
                    &observed.value,
                    observed.source_url.clone(),
                ))?;
                report.spec_sources += 1;
            }
        }
    }

    for group in groups.values() {
        for listing in &group.board.listings {
            store.insert_listing(&run.id, listing.clone())?;
            report.listings += 1;
        }
    }

    debug!(
        "Committed run {}: {} boards, {} listings",
        run.id, report.boards, report.listings
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoardSpecs, Gender, SourceTier};

    fn row(model: &str, tier: SourceTier, specs: BoardSpecs) -> BoardRow {
        BoardRow {
            board_key: BoardKey::build("Burton", model, Gender::Unisex),
            brand: "Burton".to_string(),
            model: model.to_string(),
            gender: Gender::Unisex,
            specs,
            spec_source: tier,
            extras: BTreeMap::new(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_store_creation() {
        let store = Store::new();
        assert!(store.is_empty());
        assert_eq!(store.board_count(), 0);
    }

    #[test]
    fn test_listing_before_run_is_rejected() {
        let mut store = Store::new();
        store
            .upsert_board(row("Custom", SourceTier::Retailer, BoardSpecs::default()))
            .unwrap();
        let mut listing = Listing::new("evo-1", "evo", "https://evo.example/custom", 599.0);
        listing.board_key = "burton|custom|unisex".to_string();

        let err = store
            .insert_listing(&RunId("missing".to_string()), listing)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IntegrityError>(),
            Some(IntegrityError::MissingRun { .. })
        ));
        assert_eq!(store.listing_count(), 0);
    }

    #[test]
    fn test_listing_without_board_is_rejected() {
        let mut store = Store::new();
        let run = SearchRun::new("nightly");
        store.insert_run(&run).unwrap();

        let unassigned = Listing::new("evo-1", "evo", "https://evo.example/custom", 599.0);
        let err = store.insert_listing(&run.id, unassigned).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IntegrityError>(),
            Some(IntegrityError::UnassignedListing { .. })
        ));

        let mut orphan = Listing::new("evo-2", "evo", "https://evo.example/custom", 599.0);
        orphan.board_key = "burton|custom|unisex".to_string();
        let err = store.insert_listing(&run.id, orphan).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IntegrityError>(),
            Some(IntegrityError::MissingBoard { .. })
        ));
    }

    #[test]
    fn test_merge_rows_prefers_higher_tier() {
        let cached = row(
            "Custom",
            SourceTier::Manufacturer,
            BoardSpecs {
                flex: Some(6.0),
                ..Default::default()
            },
        );
        let incoming = row(
            "Custom",
            SourceTier::Retailer,
            BoardSpecs {
                flex: Some(4.0),
                shape: Some("Twin".to_string()),
                ..Default::default()
            },
        );
        let merged = merge_rows(cached, incoming);
        assert_eq!(merged.spec_source, SourceTier::Manufacturer);
        assert_eq!(merged.specs.flex, Some(6.0));
        assert_eq!(merged.specs.shape.as_deref(), Some("Twin"));
    }

    #[test]
    fn test_merge_rows_keeps_cached_manufacturer_values() {
        let cached = row(
            "Custom",
            SourceTier::Manufacturer,
            BoardSpecs {
                flex: Some(6.0),
                ..Default::default()
            },
        );
        let incoming = row(
            "Custom",
            SourceTier::Manufacturer,
            BoardSpecs {
                flex: Some(9.0),
                category: Some("All-Mountain".to_string()),
                ..Default::default()
            },
        );
        let merged = merge_rows(cached, incoming);
        assert_eq!(merged.specs.flex, Some(6.0));
        assert_eq!(merged.specs.category.as_deref(), Some("All-Mountain"));

        let cached = row("Custom", SourceTier::Llm, BoardSpecs::default());
        let incoming = row("Custom", SourceTier::Llm, BoardSpecs::default());
        assert_eq!(merge_rows(cached, incoming).spec_source, SourceTier::Llm);
    }

    #[test]
    fn test_commit_run_records_every_observed_value() {
        use crate::model::ScrapedBoard;
        use crate::normalize::Normalizer;

        let mut shop = ScrapedBoard::new("retailer:evo", "Lib Tech", "Lib Tech Orca 159")
            .with_extra("stance", "setback");
        shop.flex = Some(7.0);
        let mut brand = ScrapedBoard::new("manufacturer:lib-tech", "Lib Tech", "Orca")
            .with_url("https://lib-tech.example/orca");
        brand.flex = Some(8.0);
        let groups = crate::identify_boards(&[shop, brand], Normalizer::shared());

        let mut store = Store::new();
        let run = SearchRun::new("nightly");
        let report = commit_run(&mut store, &run, &groups).unwrap();
        let key = BoardKey::build("Lib Tech", "Orca", Gender::Unisex);

        let flex: Vec<(SourceTier, String)> = store
            .spec_sources_for(&key)
            .unwrap()
            .into_iter()
            .filter(|source| source.field_name == "flex")
            .map(|source| (source.source_type, source.value))
            .collect();
        assert_eq!(
            flex,
            vec![
                (SourceTier::Manufacturer, "8".to_string()),
                (SourceTier::Retailer, "7".to_string()),
            ]
        );
        assert_eq!(report.spec_sources, store.spec_sources_for(&key).unwrap().len());

        let disagreements = crate::ingest::disagreements(&store, &key).unwrap();
        assert_eq!(disagreements.len(), 1);
        assert_eq!(disagreements[0].field, "flex");

        let row = store.get_board(&key).unwrap().unwrap();
        assert_eq!(row.specs.flex, Some(8.0));
        assert_eq!(row.extras.get("stance").map(String::as_str), Some("setback"));
    }

    #[test]
    fn test_spec_sources_are_append_only() {
        let mut store = Store::new();
        let key = BoardKey::build("Burton", "Custom", Gender::Unisex);
        for value in ["5", "6"] {
            store
                .append_spec_source(SpecSource::new(
                    key.clone(),
                    "flex",
                    SourceTier::Llm,
                    value,
                    None,
                ))
                .unwrap();
        }
        let rows = store.spec_sources_for(&key).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, "5");
        assert_eq!(rows[1].value, "6");
    }
}
