use boardcanon::ingest::{self, IngestOutcome, SpecRecord};
use boardcanon::model::{AbilityLevel, BoardSpecs, Gender, ScrapedBoard, SourceTier};
use boardcanon::{BoardCanon, BoardFilter, BoardKey, CatalogStore};

fn flex(value: f32) -> BoardSpecs {
    BoardSpecs {
        flex: Some(value),
        ..Default::default()
    }
}

#[test]
fn tiers_apply_in_priority_order() -> anyhow::Result<()> {
    let mut canon = BoardCanon::new()?;
    let key = BoardKey::build("CAPiTA", "DOA", Gender::Unisex);

    let deliveries = [
        (SourceTier::Judgment, 3.0, IngestOutcome::Inserted),
        (SourceTier::Llm, 4.0, IngestOutcome::Updated),
        (SourceTier::Judgment, 2.0, IngestOutcome::Skipped),
        (SourceTier::ReviewSite, 5.0, IngestOutcome::Updated),
        (SourceTier::ReviewSite, 5.5, IngestOutcome::Updated),
        (SourceTier::Manufacturer, 6.0, IngestOutcome::Updated),
        (SourceTier::Manufacturer, 9.0, IngestOutcome::Skipped),
        (SourceTier::Llm, 1.0, IngestOutcome::Skipped),
    ];

    for (tier, value, expected) in deliveries {
        let record = SpecRecord::new("Capita", "Defenders of Awesome 2025", tier).with_specs(flex(value));
        let report = canon.ingest(&[record])?;
        assert_eq!(report.outcomes, vec![(key.clone(), expected)], "{tier} {value}");
    }

    let row = canon.store().get_board(&key)?.expect("row");
    assert_eq!(row.spec_source, SourceTier::Manufacturer);
    assert_eq!(row.specs.flex, Some(6.0));
    assert_eq!(row.specs.year, Some(2025));

    let flex_rows = canon
        .store()
        .spec_sources_for(&key)?
        .into_iter()
        .filter(|source| source.field_name == "flex")
        .count();
    assert_eq!(flex_rows, deliveries.len());
    Ok(())
}

#[test]
fn skipped_delivery_still_records_extras() -> anyhow::Result<()> {
    let mut canon = BoardCanon::new()?;
    let brand = SpecRecord::new("Jones", "Flagship", SourceTier::Manufacturer)
        .with_specs(flex(8.0))
        .with_source_url("https://jones.example/flagship");
    let review = SpecRecord::new("Jones Snowboards", "Flagship", SourceTier::ReviewSite)
        .with_extra("ability level", "Advanced to Expert")
        .with_extra("riding style", "Freeride")
        .with_source_url("https://reviews.example/jones-flagship");

    let report = canon.ingest(&[brand, review])?;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);

    let key = BoardKey::build("Jones", "Flagship", Gender::Unisex);
    let sources = canon.store().spec_sources_for(&key)?;
    for field in ["ability level", "abilityLevel", "riding style", "ridingStyle"] {
        assert!(
            sources.iter().any(|s| s.field_name == field
                && s.source_type == SourceTier::ReviewSite
                && s.source_url.as_deref() == Some("https://reviews.example/jones-flagship")),
            "missing provenance for {field}"
        );
    }
    Ok(())
}

#[test]
fn disagreements_span_deliveries() -> anyhow::Result<()> {
    let mut canon = BoardCanon::new()?;
    canon.ingest(&[
        SpecRecord::new("Ride", "Warpig", SourceTier::Llm).with_specs(flex(4.0)),
        SpecRecord::new("Ride", "War Pig", SourceTier::ReviewSite).with_specs(flex(4.0)),
    ])?;
    let key = BoardKey::build("Ride", "Warpig", Gender::Unisex);
    assert!(canon.disagreements(&key)?.is_empty());

    canon.ingest(&[SpecRecord::new("Ride", "Warpig", SourceTier::Manufacturer).with_specs(flex(5.0))])?;
    let disagreements = canon.disagreements(&key)?;
    let flex = disagreements
        .iter()
        .find(|d| d.field == "flex")
        .expect("flex disagreement");
    assert_eq!(flex.values.len(), 3);
    assert!(disagreements.iter().all(|d| d.field.starts_with("flex")));
    Ok(())
}

#[test]
fn ingested_ability_range_is_searchable() -> anyhow::Result<()> {
    let mut canon = BoardCanon::new()?;
    let specs = BoardSpecs {
        ability_level_min: Some(AbilityLevel::Beginner),
        ability_level_max: Some(AbilityLevel::Intermediate),
        ..Default::default()
    };
    canon.ingest(&[
        SpecRecord::new("Burton", "Feelgood", SourceTier::Manufacturer)
            .with_gender(Gender::Womens)
            .with_specs(specs),
        SpecRecord::new("Lib Tech", "Orca", SourceTier::Manufacturer),
    ])?;

    let intermediate = canon.search(&BoardFilter::new().with_ability(AbilityLevel::Intermediate))?;
    assert_eq!(intermediate.len(), 2);

    let advanced = canon.search(&BoardFilter::new().with_ability(AbilityLevel::Advanced))?;
    assert_eq!(advanced.len(), 1);
    assert_eq!(advanced[0].model, "Orca");

    let womens = canon.search(&BoardFilter::new().with_gender(Gender::Womens))?;
    assert_eq!(womens.len(), 1);
    assert_eq!(womens[0].board_key.as_str(), "burton|feelgood|womens");

    let report = ingest::decide(Some(SourceTier::Manufacturer), SourceTier::Manufacturer);
    assert_eq!(report, IngestOutcome::Skipped);
    Ok(())
}

#[test]
fn batch_commit_respects_cached_manufacturer_row() -> anyhow::Result<()> {
    let mut canon = BoardCanon::new()?;
    canon.ingest(&[SpecRecord::new("Burton", "Custom", SourceTier::Manufacturer).with_specs(flex(6.0))])?;

    let mut catalog = ScrapedBoard::new("manufacturer:burton", "Burton", "Custom");
    catalog.flex = Some(9.0);
    catalog.shape = Some("Directional Twin".to_string());
    canon.run_batch("catalog", &[catalog])?;

    let key = BoardKey::build("Burton", "Custom", Gender::Unisex);
    let row = canon.store().get_board(&key)?.expect("custom row");
    assert_eq!(row.specs.flex, Some(6.0));
    assert_eq!(row.specs.shape.as_deref(), Some("Directional Twin"));

    let disagreements = canon.disagreements(&key)?;
    let flex = disagreements
        .iter()
        .find(|d| d.field == "flex")
        .expect("flex disagreement");
    assert_eq!(flex.values.len(), 2);
    Ok(())
}

#[test]
fn fractional_flex_is_recorded_as_delivered() -> anyhow::Result<()> {
    let mut canon = BoardCanon::new()?;
    canon.ingest(&[
        SpecRecord::new("GNU", "Money", SourceTier::Llm).with_specs(flex(6.3)),
        SpecRecord::new("GNU", "Money", SourceTier::ReviewSite).with_extra("flex", "6.3"),
    ])?;
    let key = BoardKey::build("GNU", "Money", Gender::Unisex);
    let values: Vec<String> = canon
        .store()
        .spec_sources_for(&key)?
        .into_iter()
        .filter(|source| source.field_name == "flex")
        .map(|source| source.value)
        .collect();
    assert_eq!(values, vec!["6.3".to_string(), "6.3".to_string()]);
    assert!(canon.disagreements(&key)?.is_empty());
    Ok(())
}
