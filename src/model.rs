//! # Data Model
//!
//! Core data structures for board identity resolution: per-source scraped records,
//! canonical boards, listings, provenance rows, and the trust ordering used to
//! resolve conflicts between sources.

use crate::key::BoardKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Trust ranking used to resolve conflicting specs across sources.
///
/// Variants are declared in ascending trust so the derived `Ord` compares tiers
/// by ordinal: `Manufacturer` is the greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTier {
    /// Raw retailer listing text
    Retailer,
    /// Heuristic judgment derived from other fields
    Judgment,
    /// LLM-assisted lookup
    Llm,
    /// Independent review site
    ReviewSite,
    /// The brand's own catalog
    Manufacturer,
}

impl SourceTier {
    /// All tiers, highest trust first.
    pub const BY_TRUST: [SourceTier; 5] = [
        SourceTier::Manufacturer,
        SourceTier::ReviewSite,
        SourceTier::Llm,
        SourceTier::Judgment,
        SourceTier::Retailer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Retailer => "retailer",
            SourceTier::Judgment => "judgment",
            SourceTier::Llm => "llm",
            SourceTier::ReviewSite => "review-site",
            SourceTier::Manufacturer => "manufacturer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "retailer" => Some(SourceTier::Retailer),
            "judgment" => Some(SourceTier::Judgment),
            "llm" => Some(SourceTier::Llm),
            "review-site" | "review_site" | "review" => Some(SourceTier::ReviewSite),
            "manufacturer" | "brand" => Some(SourceTier::Manufacturer),
            _ => None,
        }
    }

    /// Tier of a `"<tier>:<site>"` source id. Unknown prefixes are retailers.
    pub fn from_source_id(source_id: &str) -> Self {
        let prefix = source_id.split(':').next().unwrap_or_default();
        Self::parse(prefix).unwrap_or(SourceTier::Retailer)
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gender bucket of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Womens,
    Kids,
    Unisex,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Womens => "womens",
            Gender::Kids => "kids",
            Gender::Unisex => "unisex",
        }
    }

    /// Parse an extractor-supplied hint. Unrecognized values are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "womens" | "women's" | "women" | "female" | "w" => Some(Gender::Womens),
            "kids" | "kid's" | "kids'" | "youth" | "boys" | "girls" | "junior" => {
                Some(Gender::Kids)
            }
            "unisex" | "mens" | "men's" | "men" | "male" | "m" => Some(Gender::Unisex),
            _ => None,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ownership condition of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Blemished,
    Closeout,
    Used,
    #[default]
    Unknown,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Blemished => "blemished",
            Condition::Closeout => "closeout",
            Condition::Used => "used",
            Condition::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Condition::New),
            "blem" | "blemished" => Some(Condition::Blemished),
            "closeout" | "clearance" | "outlet" => Some(Condition::Closeout),
            "used" | "pre-owned" | "demo" => Some(Condition::Used),
            "unknown" => Some(Condition::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    InStock,
    LowStock,
    OutOfStock,
    #[default]
    Unknown,
}

/// Rider ability, ordered from least to most experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl AbilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbilityLevel::Beginner => "beginner",
            AbilityLevel::Intermediate => "intermediate",
            AbilityLevel::Advanced => "advanced",
            AbilityLevel::Expert => "expert",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" | "novice" | "entry" => Some(AbilityLevel::Beginner),
            "intermediate" => Some(AbilityLevel::Intermediate),
            "advanced" => Some(AbilityLevel::Advanced),
            "expert" | "pro" => Some(AbilityLevel::Expert),
            _ => None,
        }
    }

    /// Parse free text such as `"Beginner-Intermediate"` or `"Intermediate to Expert"`
    /// into a `(min, max)` range. Returns `None` when no level is recognized.
    pub fn parse_range(value: &str) -> Option<(AbilityLevel, AbilityLevel)> {
        let lowered = value.to_ascii_lowercase();
        if lowered.contains("all levels") || lowered.contains("all-levels") {
            return Some((AbilityLevel::Beginner, AbilityLevel::Expert));
        }
        let levels: Vec<AbilityLevel> = lowered
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter_map(AbilityLevel::parse)
            .collect();
        let min = levels.iter().min()?;
        let max = levels.iter().max()?;
        Some((*min, *max))
    }
}

impl fmt::Display for AbilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical brand resolved from an arbitrary spelling.
///
/// Equality and hashing use `canonical_name` only, so two spellings of the same
/// brand compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandIdentifier {
    pub raw_input: String,
    pub canonical_name: String,
    pub manufacturer_slug: String,
}

impl PartialEq for BrandIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_name == other.canonical_name
    }
}

impl Eq for BrandIdentifier {}

impl std::hash::Hash for BrandIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.canonical_name.hash(state);
    }
}

impl fmt::Display for BrandIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name)
    }
}

/// One retailer's price/availability offer for a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    /// Empty until the listing is assigned to a board during coalescing.
    #[serde(default)]
    pub board_key: String,
    pub retailer: String,
    #[serde(default)]
    pub region: String,
    pub url: String,
    #[serde(default)]
    pub length_cm: Option<f32>,
    #[serde(default)]
    pub width_mm: Option<f32>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub original_price: Option<f64>,
    pub sale_price: f64,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default = "default_gender")]
    pub gender: Gender,
    #[serde(with = "time::serde::rfc3339")]
    pub scraped_at: OffsetDateTime,
    #[serde(default)]
    pub combo_contents: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_gender() -> Gender {
    Gender::Unisex
}

impl Listing {
    /// Create a listing with the required fields; everything else defaults.
    pub fn new(id: &str, retailer: &str, url: &str, sale_price: f64) -> Self {
        Self {
            id: id.to_string(),
            board_key: String::new(),
            retailer: retailer.to_string(),
            region: "US".to_string(),
            url: url.to_string(),
            length_cm: None,
            width_mm: None,
            currency: default_currency(),
            original_price: None,
            sale_price,
            availability: Availability::Unknown,
            condition: Condition::Unknown,
            gender: Gender::Unisex,
            scraped_at: OffsetDateTime::now_utc(),
            combo_contents: None,
        }
    }

    pub fn with_length(mut self, length_cm: f32) -> Self {
        self.length_cm = Some(length_cm);
        self
    }

    pub fn with_original_price(mut self, price: f64) -> Self {
        self.original_price = Some(price);
        self
    }

    /// Discount relative to the original price, in percent.
    pub fn discount_percent(&self) -> Option<f64> {
        let original = self.original_price?;
        if original <= 0.0 || self.sale_price >= original {
            return None;
        }
        Some(((original - self.sale_price) / original * 100.0).round())
    }
}

/// Per-source record produced by a site extractor. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedBoard {
    /// `"<tier>:<site>"`, e.g. `retailer:evo` or `manufacturer:burton`
    pub source_id: String,
    /// Raw brand text as the source spelled it
    #[serde(default)]
    pub brand: String,
    pub raw_model_title: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub gender_hint: Option<Gender>,
    #[serde(default)]
    pub year_hint: Option<u16>,
    #[serde(default)]
    pub condition_hint: Option<Condition>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub ability_level: Option<String>,
    #[serde(default)]
    pub flex: Option<f32>,
    #[serde(default)]
    pub msrp_usd: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
    #[serde(default)]
    pub listings: Vec<Listing>,
}

impl ScrapedBoard {
    pub fn new(source_id: &str, brand: &str, raw_model_title: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            brand: brand.to_string(),
            raw_model_title: raw_model_title.to_string(),
            source_url: String::new(),
            gender_hint: None,
            year_hint: None,
            condition_hint: None,
            profile: None,
            shape: None,
            category: None,
            ability_level: None,
            flex: None,
            msrp_usd: None,
            description: None,
            extras: BTreeMap::new(),
            listings: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.source_url = url.to_string();
        self
    }

    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listings.push(listing);
        self
    }

    pub fn with_extra(mut self, key: &str, value: &str) -> Self {
        self.extras.insert(key.to_string(), value.to_string());
        self
    }

    pub fn tier(&self) -> SourceTier {
        SourceTier::from_source_id(&self.source_id)
    }
}

/// Spec fields shared by canonical boards, persisted rows and incoming spec records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSpecs {
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub flex: Option<f32>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub terrain_scores: BTreeMap<String, f32>,
    #[serde(default)]
    pub ability_level_min: Option<AbilityLevel>,
    #[serde(default)]
    pub ability_level_max: Option<AbilityLevel>,
    #[serde(default)]
    pub msrp_usd: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BoardSpecs {
    /// Fill every field that is still empty from `other`. Existing values win.
    pub fn fill_missing(&mut self, other: &BoardSpecs) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.year, &other.year);
        fill(&mut self.flex, &other.flex);
        fill(&mut self.profile, &other.profile);
        fill(&mut self.shape, &other.shape);
        fill(&mut self.category, &other.category);
        fill(&mut self.ability_level_min, &other.ability_level_min);
        fill(&mut self.ability_level_max, &other.ability_level_max);
        fill(&mut self.msrp_usd, &other.msrp_usd);
        fill(&mut self.description, &other.description);
        for (terrain, score) in &other.terrain_scores {
            self.terrain_scores.entry(terrain.clone()).or_insert(*score);
        }
    }

    /// Non-null fields rendered as `(field_name, value)` pairs, in a stable order.
    pub fn field_values(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        if let Some(year) = self.year {
            fields.push(("year".to_string(), year.to_string()));
        }
        if let Some(flex) = self.flex {
            fields.push(("flex".to_string(), format_f32(flex)));
        }
        if let Some(profile) = &self.profile {
            fields.push(("profile".to_string(), profile.clone()));
        }
        if let Some(shape) = &self.shape {
            fields.push(("shape".to_string(), shape.clone()));
        }
        if let Some(category) = &self.category {
            fields.push(("category".to_string(), category.clone()));
        }
        if let Some(min) = self.ability_level_min {
            fields.push(("abilityLevelMin".to_string(), min.to_string()));
        }
        if let Some(max) = self.ability_level_max {
            fields.push(("abilityLevelMax".to_string(), max.to_string()));
        }
        if let Some(msrp) = self.msrp_usd {
            fields.push(("msrpUsd".to_string(), format_number(msrp)));
        }
        if let Some(description) = &self.description {
            fields.push(("description".to_string(), description.clone()));
        }
        for (terrain, score) in &self.terrain_scores {
            fields.push((format!("terrain.{}", terrain), format_f32(*score)));
        }
        fields
    }
}

/// Shortest `f32` rendering, without widening to `f64`.
pub(crate) fn format_f32(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// One physical snowboard model/variant, canonicalized across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub board_key: BoardKey,
    pub brand: String,
    pub model: String,
    pub gender: Gender,
    #[serde(flatten)]
    pub specs: BoardSpecs,
    #[serde(default)]
    pub listings: Vec<Listing>,
}

impl Board {
    pub fn best_price(&self) -> Option<f64> {
        self.listings
            .iter()
            .map(|listing| listing.sale_price)
            .fold(None, |best, price| match best {
                Some(current) if current <= price => Some(current),
                _ => Some(price),
            })
    }
}

/// Append-only provenance row for one field value from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSource {
    pub board_key: BoardKey,
    pub field_name: String,
    pub source_type: SourceTier,
    pub value: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub inserted_at: OffsetDateTime,
}

impl SpecSource {
    pub fn new(
        board_key: BoardKey,
        field_name: &str,
        source_type: SourceTier,
        value: &str,
        source_url: Option<String>,
    ) -> Self {
        Self {
            board_key,
            field_name: field_name.to_string(),
            source_type,
            value: value.to_string(),
            source_url,
            inserted_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Identifier of a search run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parent record every persisted listing references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRun {
    pub id: RunId,
    pub label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

impl SearchRun {
    pub fn new(label: &str) -> Self {
        Self {
            id: RunId::generate(),
            label: label.to_string(),
            started_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Persisted boards-table row; also the long-lived spec cache used by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRow {
    pub board_key: BoardKey,
    pub brand: String,
    pub model: String,
    pub gender: Gender,
    pub specs: BoardSpecs,
    pub spec_source: SourceTier,
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BoardRow {
    pub fn into_board(self, listings: Vec<Listing>) -> Board {
        Board {
            board_key: self.board_key,
            brand: self.brand,
            model: self.model,
            gender: self.gender,
            specs: self.specs,
            listings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tier_ordinal_order() {
        assert!(SourceTier::Manufacturer > SourceTier::ReviewSite);
        assert!(SourceTier::ReviewSite > SourceTier::Llm);
        assert!(SourceTier::Llm > SourceTier::Judgment);
        assert!(SourceTier::Judgment > SourceTier::Retailer);

        let mut sorted = SourceTier::BY_TRUST.to_vec();
        sorted.sort();
        sorted.reverse();
        assert_eq!(sorted, SourceTier::BY_TRUST.to_vec());
    }

    #[test]
    fn test_source_tier_from_source_id() {
        assert_eq!(SourceTier::from_source_id("manufacturer:burton"), SourceTier::Manufacturer);
        assert_eq!(SourceTier::from_source_id("review-site:good-ride"), SourceTier::ReviewSite);
        assert_eq!(SourceTier::from_source_id("llm"), SourceTier::Llm);
        assert_eq!(SourceTier::from_source_id("retailer:evo"), SourceTier::Retailer);
        assert_eq!(SourceTier::from_source_id("evo"), SourceTier::Retailer);
        assert_eq!(SourceTier::from_source_id(""), SourceTier::Retailer);
    }

    #[test]
    fn test_ability_range_parsing() {
        assert_eq!(
            AbilityLevel::parse_range("Beginner-Intermediate"),
            Some((AbilityLevel::Beginner, AbilityLevel::Intermediate))
        );
        assert_eq!(
            AbilityLevel::parse_range("Expert / Advanced"),
            Some((AbilityLevel::Advanced, AbilityLevel::Expert))
        );
        assert_eq!(
            AbilityLevel::parse_range("Intermediate"),
            Some((AbilityLevel::Intermediate, AbilityLevel::Intermediate))
        );
        assert_eq!(
            AbilityLevel::parse_range("All Levels"),
            Some((AbilityLevel::Beginner, AbilityLevel::Expert))
        );
        assert_eq!(AbilityLevel::parse_range("shreddy"), None);
    }

    #[test]
    fn test_brand_identifier_equality_by_canonical_name() {
        let a = BrandIdentifier {
            raw_input: "libtech".to_string(),
            canonical_name: "Lib Tech".to_string(),
            manufacturer_slug: "lib-tech".to_string(),
        };
        let b = BrandIdentifier {
            raw_input: "LIB TECH".to_string(),
            canonical_name: "Lib Tech".to_string(),
            manufacturer_slug: "lib-tech".to_string(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_listing_discount() {
        let listing = Listing::new("l1", "evo", "https://evo.com/x", 450.0).with_original_price(600.0);
        assert_eq!(listing.discount_percent(), Some(25.0));

        let full_price = Listing::new("l2", "evo", "https://evo.com/y", 600.0).with_original_price(600.0);
        assert_eq!(full_price.discount_percent(), None);
    }

    #[test]
    fn test_scraped_board_json_round_trip_uses_camel_case() {
        let board = ScrapedBoard::new("retailer:evo", "Burton", "Burton Custom 158")
            .with_url("https://evo.com/burton-custom")
            .with_extra("stance", "centered");
        let json = serde_json::to_string(&board).unwrap();
        assert!(json.contains("\"rawModelTitle\""));
        assert!(json.contains("\"sourceId\""));
        let parsed: ScrapedBoard = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, board);
    }

    #[test]
    fn test_fill_missing_keeps_existing_values() {
        let mut specs = BoardSpecs {
            flex: Some(5.0),
            ..Default::default()
        };
        let mut terrain_scores = BTreeMap::new();
        terrain_scores.insert("park".to_string(), 4.0);
        specs.fill_missing(&BoardSpecs {
            flex: Some(8.0),
            shape: Some("Twin".to_string()),
            terrain_scores,
            ..Default::default()
        });
        assert_eq!(specs.flex, Some(5.0));
        assert_eq!(specs.shape.as_deref(), Some("Twin"));
        assert_eq!(specs.terrain_scores.get("park"), Some(&4.0));
    }

    #[test]
    fn test_fractional_f32_fields_format_exactly() {
        let mut specs = BoardSpecs {
            flex: Some(6.3),
            ..Default::default()
        };
        specs.terrain_scores.insert("powder".to_string(), 4.1);
        let fields = specs.field_values();
        assert!(fields.contains(&("flex".to_string(), "6.3".to_string())));
        assert!(fields.contains(&("terrain.powder".to_string(), "4.1".to_string())));
    }

    #[test]
    fn test_specs_field_values_are_stable() {
        let specs = BoardSpecs {
            flex: Some(6.0),
            msrp_usd: Some(599.95),
            profile: Some("Camber".to_string()),
            ..Default::default()
        };
        let fields = specs.field_values();
        assert_eq!(
            fields,
            vec![
                ("flex".to_string(), "6".to_string()),
                ("profile".to_string(), "Camber".to_string()),
                ("msrpUsd".to_string(), "599.95".to_string()),
            ]
        );
    }
}
