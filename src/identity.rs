//! # Identity Deriver
//!
//! Derives brand, model, condition, gender and year from one raw record. Each
//! facet has its own precedence resolver and is memoized independently, so facets
//! can be read in any order or subset with identical results.

use crate::brand;
use crate::key::BoardKey;
use crate::model::{BrandIdentifier, Condition, Gender, ScrapedBoard};
use crate::normalize::Normalizer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::OnceCell;

/// Model recorded when a title normalizes to nothing.
pub const UNRESOLVED_MODEL: &str = "Unknown";

static WOMENS_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:women|womens|woman|womans|wmns|wms|ladies)\b").unwrap());

static KIDS_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:kid|kids|youth|boy|boys|girl|girls|junior|juniors)\b").unwrap()
});

static BLEM_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:blem|blemished|b-grade)\b").unwrap());

static CLOSEOUT_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:closeout|clearance)\b").unwrap());

static USED_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:used|pre-owned|preowned|demo)\b").unwrap());

static YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\s*/\s*((?:19|20)?\d{2})\b").unwrap());

static SHORT_SEASON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})/(\d{2})\b").unwrap());

static SINGLE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(199\d|20[0-3]\d)\b").unwrap());

/// Raw inputs of one identity derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityInput {
    pub raw_model: String,
    pub raw_brand: String,
    pub url: Option<String>,
    pub condition_hint: Option<Condition>,
    pub gender_hint: Option<Gender>,
    pub year_hint: Option<u16>,
}

impl IdentityInput {
    pub fn new(raw_model: &str, raw_brand: &str) -> Self {
        Self {
            raw_model: raw_model.to_string(),
            raw_brand: raw_brand.to_string(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_condition_hint(mut self, condition: Condition) -> Self {
        self.condition_hint = Some(condition);
        self
    }

    pub fn with_gender_hint(mut self, gender: Gender) -> Self {
        self.gender_hint = Some(gender);
        self
    }

    pub fn with_year_hint(mut self, year: u16) -> Self {
        self.year_hint = Some(year);
        self
    }
}

impl From<&ScrapedBoard> for IdentityInput {
    fn from(record: &ScrapedBoard) -> Self {
        Self {
            raw_model: record.raw_model_title.clone(),
            raw_brand: record.brand.clone(),
            url: (!record.source_url.is_empty()).then(|| record.source_url.clone()),
            condition_hint: record.condition_hint,
            gender_hint: record.gender_hint,
            year_hint: record.year_hint,
        }
    }
}

/// Lazily derived identity of one record. Never stored.
pub struct BoardIdentifier<'n> {
    input: IdentityInput,
    normalizer: &'n Normalizer,
    brand: OnceCell<BrandIdentifier>,
    model: OnceCell<String>,
    condition: OnceCell<Condition>,
    gender: OnceCell<Gender>,
    year: OnceCell<Option<u16>>,
}

impl<'n> BoardIdentifier<'n> {
    pub fn new(input: IdentityInput, normalizer: &'n Normalizer) -> Self {
        Self {
            input,
            normalizer,
            brand: OnceCell::new(),
            model: OnceCell::new(),
            condition: OnceCell::new(),
            gender: OnceCell::new(),
            year: OnceCell::new(),
        }
    }

    pub fn input(&self) -> &IdentityInput {
        &self.input
    }

    pub fn brand(&self) -> &BrandIdentifier {
        self.brand
            .get_or_init(|| brand::canonicalize(&self.input.raw_brand))
    }

    /// Normalized model; `Unknown` when nothing identifying survives.
    pub fn model(&self) -> &str {
        self.model.get_or_init(|| {
            let normalized = self.normalizer.normalize(
                &self.input.raw_model,
                Some(self.brand()),
                self.normalizer.defaults(),
            );
            if normalized.is_empty() {
                UNRESOLVED_MODEL.to_string()
            } else {
                normalized
            }
        })
    }

    pub fn condition(&self) -> Condition {
        *self.condition.get_or_init(|| {
            resolve_condition(
                self.input.condition_hint,
                self.input.url.as_deref(),
                &self.input.raw_model,
            )
        })
    }

    pub fn gender(&self) -> Gender {
        *self
            .gender
            .get_or_init(|| resolve_gender(self.input.gender_hint, &self.input.raw_model))
    }

    pub fn year(&self) -> Option<u16> {
        *self
            .year
            .get_or_init(|| resolve_year(self.input.year_hint, &self.input.raw_model))
    }

    pub fn is_resolved(&self) -> bool {
        !self.model().eq_ignore_ascii_case(UNRESOLVED_MODEL)
    }

    pub fn key(&self) -> BoardKey {
        BoardKey::build(&self.brand().canonical_name, self.model(), self.gender())
    }
}

/// Hint, then URL markers, then title keywords, then `New`.
pub fn resolve_condition(hint: Option<Condition>, url: Option<&str>, title: &str) -> Condition {
    if let Some(hint) = hint.filter(|hint| *hint != Condition::Unknown) {
        return hint;
    }
    if let Some(condition) = url.and_then(condition_from_url) {
        return condition;
    }
    if BLEM_WORDS.is_match(title) {
        Condition::Blemished
    } else if CLOSEOUT_WORDS.is_match(title) {
        Condition::Closeout
    } else if USED_WORDS.is_match(title) {
        Condition::Used
    } else {
        Condition::New
    }
}

fn condition_from_url(url: &str) -> Option<Condition> {
    let url = url.to_ascii_lowercase();
    if url.contains("-blem") {
        Some(Condition::Blemished)
    } else if url.contains("-used") || url.contains("/used/") {
        Some(Condition::Used)
    } else if url.contains("-closeout") || url.contains("/closeout") || url.contains("/outlet/") {
        Some(Condition::Closeout)
    } else {
        None
    }
}

/// Hint, then title keywords, then `Unisex`. A hint always wins over text.
pub fn resolve_gender(hint: Option<Gender>, title: &str) -> Gender {
    if let Some(hint) = hint {
        return hint;
    }
    let title = title.replace(['\'', '\u{2019}'], "");
    if WOMENS_WORDS.is_match(&title) {
        Gender::Womens
    } else if KIDS_WORDS.is_match(&title) {
        Gender::Kids
    } else {
        Gender::Unisex
    }
}

/// Hint, then the end year of a season range, then a single 4-digit year.
pub fn resolve_year(hint: Option<u16>, title: &str) -> Option<u16> {
    if hint.is_some() {
        return hint;
    }
    if let Some(caps) = YEAR_RANGE.captures(title) {
        let start = &caps[1];
        let end = &caps[2];
        let end = if end.len() == 2 {
            format!("{}{}", &start[..2], end)
        } else {
            end.to_string()
        };
        return end.parse().ok();
    }
    if let Some(caps) = SHORT_SEASON.captures(title) {
        return caps[2].parse::<u16>().ok().map(|end| 2000 + end);
    }
    SINGLE_YEAR
        .captures(title)
        .and_then(|caps| caps[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> &'static Normalizer {
        Normalizer::shared()
    }

    #[test]
    fn test_condition_precedence() {
        assert_eq!(
            resolve_condition(Some(Condition::Used), Some("https://x.com/custom-blem"), "Custom (Closeout)"),
            Condition::Used
        );
        assert_eq!(
            resolve_condition(None, Some("https://x.com/outlet/custom"), "Custom Blem"),
            Condition::Closeout
        );
        assert_eq!(resolve_condition(None, Some("https://x.com/custom-blem"), "Custom"), Condition::Blemished);
        assert_eq!(resolve_condition(None, Some("https://x.com/used/custom"), "Custom"), Condition::Used);
        assert_eq!(resolve_condition(None, None, "Custom - Clearance"), Condition::Closeout);
        assert_eq!(resolve_condition(None, None, "Custom Demo"), Condition::Used);
        assert_eq!(resolve_condition(Some(Condition::Unknown), None, "Custom"), Condition::New);
    }

    #[test]
    fn test_gender_hint_overrides_text() {
        assert_eq!(resolve_gender(Some(Gender::Unisex), "Women's Feelgood"), Gender::Unisex);
        assert_eq!(resolve_gender(None, "Women\u{2019}s Feelgood"), Gender::Womens);
        assert_eq!(resolve_gender(None, "Kids' Chopper"), Gender::Kids);
        assert_eq!(resolve_gender(None, "Girl's Chicklet"), Gender::Kids);
        assert_eq!(resolve_gender(None, "Custom"), Gender::Unisex);
    }

    #[test]
    fn test_year_resolution() {
        assert_eq!(resolve_year(Some(2024), "Custom 2026"), Some(2024));
        assert_eq!(resolve_year(None, "Custom 2025/2026"), Some(2026));
        assert_eq!(resolve_year(None, "Custom 2025/26"), Some(2026));
        assert_eq!(resolve_year(None, "Custom 24/25"), Some(2025));
        assert_eq!(resolve_year(None, "Custom 2026"), Some(2026));
        assert_eq!(resolve_year(None, "K2000"), None);
        assert_eq!(resolve_year(None, "Custom"), None);
    }

    #[test]
    fn test_facets_are_order_independent() {
        let input = IdentityInput::new("Burton Women's Feelgood Snowboard 2025/26 (Blem)", "burton")
            .with_url("https://shop.example/feelgood-blem");

        let forward = BoardIdentifier::new(input.clone(), normalizer());
        let forward_values = (
            forward.brand().clone(),
            forward.model().to_string(),
            forward.condition(),
            forward.gender(),
            forward.year(),
        );

        let backward = BoardIdentifier::new(input, normalizer());
        let year = backward.year();
        let gender = backward.gender();
        let condition = backward.condition();
        let model = backward.model().to_string();
        let brand = backward.brand().clone();

        assert_eq!(forward_values, (brand, model, condition, gender, year));
        assert_eq!(forward_values.1, "Feelgood");
        assert_eq!(forward_values.2, Condition::Blemished);
        assert_eq!(forward_values.3, Gender::Womens);
        assert_eq!(forward_values.4, Some(2026));
    }

    #[test]
    fn test_empty_model_is_unresolved() {
        let identity = BoardIdentifier::new(IdentityInput::new("Snowboard 2026", ""), normalizer());
        assert_eq!(identity.brand().canonical_name, "Unknown");
        assert_eq!(identity.model(), UNRESOLVED_MODEL);
        assert!(!identity.is_resolved());
        assert_eq!(identity.key().as_str(), "unknown|unknown|unisex");
    }

    #[test]
    fn test_key_from_scraped_record() {
        let record = ScrapedBoard::new("retailer:evo", "Lib Tech", "Lib Tech Orca Snowboard 159");
        let identity = BoardIdentifier::new(IdentityInput::from(&record), normalizer());
        assert_eq!(identity.key().as_str(), "lib tech|orca|unisex");
    }
}
