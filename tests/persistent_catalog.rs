#[path = "../src/test_support.rs"]
mod test_support;

use boardcanon::ingest::SpecRecord;
use boardcanon::model::{BoardSpecs, Gender, Listing, RunId, SearchRun, SourceTier};
use boardcanon::{
    identify_boards, BoardCanon, BoardCanonConfig, BoardKey, CatalogStore, IntegrityError,
    Normalizer, PersistentStore,
};
use tempfile::tempdir;
use test_support::{burton_custom_batch, generate_batch};

fn config_at(path: &std::path::Path) -> BoardCanonConfig {
    let mut config = BoardCanonConfig::default();
    config.storage.path = path.to_path_buf();
    config
}

#[test]
fn committed_run_survives_reopen() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let key = BoardKey::build("Burton", "Custom", Gender::Unisex);
    let run = SearchRun::new("nightly");

    {
        let mut canon = BoardCanon::open(config_at(dir.path()))?;
        let groups = canon.identify_boards(&burton_custom_batch());
        let report = canon.commit_run(&run, &groups)?;
        assert_eq!(report.boards, 2);
        assert_eq!(report.listings, 3);
    }

    let canon = BoardCanon::open(config_at(dir.path()))?;
    assert_eq!(canon.store().get_run(&run.id)?, Some(run.clone()));

    let board = canon.board(&key)?.expect("custom board");
    assert_eq!(board.listings.len(), 3);
    let mut lengths: Vec<u32> = board
        .listings
        .iter()
        .filter_map(|l| l.length_cm.map(|cm| cm as u32))
        .collect();
    lengths.sort_unstable();
    assert_eq!(lengths, vec![155, 158, 161]);

    let stored = canon.store().listings_for_board(&key)?;
    assert!(stored.iter().all(|s| s.run_id == run.id));

    let camber = canon
        .store()
        .get_board(&BoardKey::build("Burton", "Custom Camber", Gender::Unisex))?
        .expect("custom camber row");
    assert_eq!(camber.spec_source, SourceTier::Manufacturer);
    let flex_sources: Vec<_> = canon
        .store()
        .spec_sources_for(&camber.board_key)?
        .into_iter()
        .filter(|s| s.field_name == "flex")
        .collect();
    assert_eq!(flex_sources.len(), 1);
    assert_eq!(flex_sources[0].value, "6");
    Ok(())
}

#[test]
fn listing_without_run_is_rejected_on_disk() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut store = PersistentStore::open(dir.path())?;
    let groups = identify_boards(&burton_custom_batch(), Normalizer::shared());
    for group in groups.values() {
        store.upsert_board(group.to_row())?;
    }

    let mut listing = Listing::new("evo-orphan", "evo", "https://evo.example/custom", 599.0);
    listing.board_key = "burton|custom|unisex".to_string();
    let err = store
        .insert_listing(&RunId("never-inserted".to_string()), listing)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IntegrityError>(),
        Some(IntegrityError::MissingRun { .. })
    ));

    let key = BoardKey::build("Burton", "Custom", Gender::Unisex);
    assert!(store.listings_for_board(&key)?.is_empty());
    Ok(())
}

#[test]
fn repeated_runs_merge_boards_by_tier() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut canon = BoardCanon::open(config_at(dir.path()))?;

    canon.ingest(&[SpecRecord::new("Burton", "Custom", SourceTier::Manufacturer).with_specs(
        BoardSpecs {
            flex: Some(6.0),
            ..Default::default()
        },
    )])?;

    let (_, first) = canon.run_batch("first", &burton_custom_batch())?;
    let (_, second) = canon.run_batch("second", &generate_batch(200, 3))?;
    assert_eq!(first.listings, 3);
    assert_eq!(second.listings, 200);

    let key = BoardKey::build("Burton", "Custom", Gender::Unisex);
    let row = canon.store().get_board(&key)?.expect("custom row");
    assert_eq!(row.spec_source, SourceTier::Manufacturer);
    assert_eq!(row.specs.flex, Some(6.0));
    assert_eq!(row.specs.year, Some(2026));
    Ok(())
}
