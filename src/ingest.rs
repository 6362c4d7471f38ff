//! # Spec Ingestion
//!
//! Incremental delivery of spec records into the long-lived boards cache. The
//! cached row changes only when the incoming source is at least as trusted as the
//! one that wrote it; every incoming field is recorded as provenance either way.

use crate::coalesce::{FieldDisagreement, SourcedValue};
use crate::identity::{BoardIdentifier, IdentityInput};
use crate::key::BoardKey;
use crate::model::{BoardRow, BoardSpecs, Gender, SourceTier, SpecSource};
use crate::normalize::Normalizer;
use crate::store::CatalogStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{debug, instrument};

/// Free-text field names and their camelCase canonical spelling.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("ability level", "abilityLevel"),
    ("flex rating", "flex"),
    ("riding style", "ridingStyle"),
    ("camber profile", "profile"),
    ("msrp", "msrpUsd"),
    ("waist width", "waistWidth"),
];

/// The other spelling of a known field alias, if `name` is one.
pub fn field_alias(name: &str) -> Option<&'static str> {
    let lowered = name.trim().to_lowercase();
    FIELD_ALIASES.iter().find_map(|(free_text, canonical)| {
        if lowered == *free_text {
            Some(*canonical)
        } else if name.trim() == *canonical {
            Some(*free_text)
        } else {
            None
        }
    })
}

/// One incoming spec delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRecord {
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub gender_hint: Option<Gender>,
    pub tier: SourceTier,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub specs: BoardSpecs,
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl SpecRecord {
    pub fn new(brand: &str, model: &str, tier: SourceTier) -> Self {
        Self {
            brand: brand.to_string(),
            model: model.to_string(),
            gender_hint: None,
            tier,
            source_url: None,
            specs: BoardSpecs::default(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_specs(mut self, specs: BoardSpecs) -> Self {
        self.specs = specs;
        self
    }

    pub fn with_extra(mut self, name: &str, value: &str) -> Self {
        self.extras.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender_hint = Some(gender);
        self
    }

    pub fn with_source_url(mut self, url: &str) -> Self {
        self.source_url = Some(url.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestOutcome {
    Inserted,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub outcomes: Vec<(BoardKey, IngestOutcome)>,
}

impl IngestReport {
    fn record(&mut self, key: BoardKey, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Inserted => self.inserted += 1,
            IngestOutcome::Updated => self.updated += 1,
            IngestOutcome::Skipped => self.skipped += 1,
        }
        self.outcomes.push((key, outcome));
    }
}

/// Source-priority decision against the tier that wrote the cached row.
pub fn decide(cached: Option<SourceTier>, incoming: SourceTier) -> IngestOutcome {
    match cached {
        None => IngestOutcome::Inserted,
        Some(SourceTier::Manufacturer) if incoming == SourceTier::Manufacturer => {
            IngestOutcome::Skipped
        }
        Some(cached) if incoming >= cached => IngestOutcome::Updated,
        Some(_) => IngestOutcome::Skipped,
    }
}

/// Apply `records` to the cache in order.
#[instrument(skip(store, records, normalizer), fields(records = records.len()), level = "debug")]
pub fn ingest(
    store: &mut dyn CatalogStore,
    records: &[SpecRecord],
    normalizer: &Normalizer,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for record in records {
        let (key, outcome) = ingest_one(store, record, normalizer)?;
        debug!("Ingested {} from {}: {:?}", key, record.tier, outcome);
        report.record(key, outcome);
    }
    Ok(report)
}

fn ingest_one(
    store: &mut dyn CatalogStore,
    record: &SpecRecord,
    normalizer: &Normalizer,
) -> Result<(BoardKey, IngestOutcome)> {
    let mut input = IdentityInput::new(&record.model, &record.brand);
    input.gender_hint = record.gender_hint;
    input.url = record.source_url.clone();
    let identity = BoardIdentifier::new(input, normalizer);
    let key = identity.key();

    let mut specs = record.specs.clone();
    if specs.year.is_none() {
        specs.year = identity.year();
    }
    let extras = with_alias_spellings(&record.extras);

    for (field, value) in specs.field_values().into_iter().chain(extras.clone()) {
        store.append_spec_source(SpecSource::new(
            key.clone(),
            &field,
            record.tier,
            &value,
            record.source_url.clone(),
        ))?;
        if let Some(alias) = field_alias(&field).filter(|alias| !extras.contains_key(*alias)) {
            store.append_spec_source(SpecSource::new(
                key.clone(),
                alias,
                record.tier,
                &value,
                record.source_url.clone(),
            ))?;
        }
    }

    let cached = store.get_board(&key)?;
    let outcome = decide(cached.as_ref().map(|row| row.spec_source), record.tier);
    match outcome {
        IngestOutcome::Skipped => {}
        IngestOutcome::Inserted | IngestOutcome::Updated => {
            let mut row = BoardRow {
                board_key: key.clone(),
                brand: identity.brand().canonical_name.clone(),
                model: identity.model().to_string(),
                gender: identity.gender(),
                specs,
                spec_source: record.tier,
                extras,
                updated_at: OffsetDateTime::now_utc(),
            };
            if let Some(cached) = cached {
                row.specs.fill_missing(&cached.specs);
                for (name, value) in cached.extras {
                    row.extras.entry(name).or_insert(value);
                }
            }
            store.upsert_board(row)?;
        }
    }
    Ok((key, outcome))
}

/// Extras with every known alias also written under its other spelling.
fn with_alias_spellings(extras: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut expanded = extras.clone();
    for (name, value) in extras {
        if let Some(alias) = field_alias(name) {
            expanded
                .entry(alias.to_string())
                .or_insert_with(|| value.clone());
        }
    }
    expanded
}

/// Fields whose provenance rows for `key` carry more than one distinct value.
pub fn disagreements(store: &dyn CatalogStore, key: &BoardKey) -> Result<Vec<FieldDisagreement>> {
    let mut by_field: BTreeMap<String, Vec<SourcedValue>> = BTreeMap::new();
    for source in store.spec_sources_for(key)? {
        by_field.entry(source.field_name).or_default().push(SourcedValue {
            tier: source.source_type,
            source_id: source
                .source_url
                .clone()
                .unwrap_or_else(|| source.source_type.to_string()),
            value: source.value,
            source_url: source.source_url,
        });
    }

    Ok(by_field
        .into_iter()
        .filter(|(_, values)| {
            let first = values[0].value.trim().to_lowercase();
            values
                .iter()
                .any(|value| value.value.trim().to_lowercase() != first)
        })
        .map(|(field, values)| FieldDisagreement { field, values })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn flex(value: f32) -> BoardSpecs {
        BoardSpecs {
            flex: Some(value),
            ..Default::default()
        }
    }

    #[test]
    fn test_decision_table() {
        use IngestOutcome::*;
        use SourceTier::*;
        assert_eq!(decide(None, Judgment), Inserted);
        assert_eq!(decide(Some(Manufacturer), Manufacturer), Skipped);
        assert_eq!(decide(Some(Llm), Manufacturer), Updated);
        assert_eq!(decide(Some(ReviewSite), ReviewSite), Updated);
        assert_eq!(decide(Some(Llm), Judgment), Skipped);
        assert_eq!(decide(Some(Manufacturer), ReviewSite), Skipped);
    }

    #[test]
    fn test_manufacturer_over_cached_manufacturer_is_skipped() {
        let mut store = Store::new();
        let normalizer = Normalizer::shared();
        let first = SpecRecord::new("Burton", "Custom", SourceTier::Manufacturer).with_specs(flex(6.0));
        let second = SpecRecord::new("Burton", "Custom", SourceTier::Manufacturer).with_specs(flex(9.0));

        ingest(&mut store, &[first], normalizer).unwrap();
        let before = store
            .get_board(&BoardKey::build("Burton", "Custom", Gender::Unisex))
            .unwrap()
            .unwrap();
        let report = ingest(&mut store, &[second], normalizer).unwrap();
        assert_eq!(report.skipped, 1);

        let after = store.get_board(&before.board_key).unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(after.specs.flex, Some(6.0));
    }

    #[test]
    fn test_manufacturer_overwrites_cached_llm() {
        let mut store = Store::new();
        let normalizer = Normalizer::shared();
        let llm = SpecRecord::new("Burton", "Custom", SourceTier::Llm)
            .with_specs(BoardSpecs {
                flex: Some(4.0),
                shape: Some("Twin".to_string()),
                ..Default::default()
            });
        let brand = SpecRecord::new("Burton", "Custom", SourceTier::Manufacturer).with_specs(flex(6.0));

        ingest(&mut store, &[llm], normalizer).unwrap();
        let report = ingest(&mut store, &[brand], normalizer).unwrap();
        assert_eq!(report.updated, 1);

        let row = store
            .get_board(&BoardKey::build("Burton", "Custom", Gender::Unisex))
            .unwrap()
            .unwrap();
        assert_eq!(row.spec_source, SourceTier::Manufacturer);
        assert_eq!(row.specs.flex, Some(6.0));
        assert_eq!(row.specs.shape.as_deref(), Some("Twin"));
    }

    #[test]
    fn test_provenance_written_on_skip() {
        let mut store = Store::new();
        let normalizer = Normalizer::shared();
        let brand = SpecRecord::new("Lib Tech", "Orca", SourceTier::Manufacturer).with_specs(flex(7.0));
        let judgment = SpecRecord::new("Lib Tech", "Orca", SourceTier::Judgment)
            .with_specs(flex(8.0))
            .with_extra("ability level", "Advanced-Expert");

        ingest(&mut store, &[brand], normalizer).unwrap();
        let report = ingest(&mut store, &[judgment], normalizer).unwrap();
        assert_eq!(report.skipped, 1);

        let key = BoardKey::build("Lib Tech", "Orca", Gender::Unisex);
        let sources = store.spec_sources_for(&key).unwrap();
        let fields: Vec<&str> = sources.iter().map(|s| s.field_name.as_str()).collect();
        assert!(fields.contains(&"ability level"));
        assert!(fields.contains(&"abilityLevel"));
        assert!(fields.contains(&"flex rating"));

        let row = store.get_board(&key).unwrap().unwrap();
        assert!(row.extras.is_empty());

        let disagreements = disagreements(&store, &key).unwrap();
        assert!(disagreements.iter().any(|d| d.field == "flex"));
    }

    #[test]
    fn test_alias_written_under_both_names_in_row() {
        let mut store = Store::new();
        let record = SpecRecord::new("Jones", "Mountain Twin", SourceTier::ReviewSite)
            .with_extra("flex rating", "6/10");
        ingest(&mut store, &[record], Normalizer::shared()).unwrap();
        let row = store
            .get_board(&BoardKey::build("Jones", "Mountain Twin", Gender::Unisex))
            .unwrap()
            .unwrap();
        assert_eq!(row.extras.get("flex rating").map(String::as_str), Some("6/10"));
        assert_eq!(row.extras.get("flex").map(String::as_str), Some("6/10"));
    }

    #[test]
    fn test_field_alias_both_directions() {
        assert_eq!(field_alias("Ability Level"), Some("abilityLevel"));
        assert_eq!(field_alias("abilityLevel"), Some("ability level"));
        assert_eq!(field_alias("flex"), Some("flex rating"));
        assert_eq!(field_alias("shape"), None);
    }
}
