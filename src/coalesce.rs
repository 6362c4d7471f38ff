//! # Coalescing Engine
//!
//! Groups a batch of per-source records by identity key and resolves each group
//! into one canonical board. Spec conflicts are settled by source trust, and
//! cross-tier disagreements are reported without blocking the merge.

use crate::identity::{BoardIdentifier, IdentityInput};
use crate::key::BoardKey;
use crate::model::{
    AbilityLevel, Board, BoardRow, BoardSpecs, Condition, Gender, Listing, ScrapedBoard,
    SourceTier,
};
use crate::normalize::{self, Normalizer};
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

/// Which source supplied a resolved field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSource {
    pub tier: SourceTier,
    pub source_id: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub disagreement: bool,
}

/// One source's value in a disagreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcedValue {
    pub tier: SourceTier,
    pub source_id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// A field whose sources in different trust tiers report different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDisagreement {
    pub field: String,
    pub values: Vec<SourcedValue>,
}

/// A resolved group: the canonical board plus its per-field source summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardGroup {
    pub board: Board,
    /// Source ids of the member records, in input order
    pub members: Vec<String>,
    /// Highest tier among the members
    pub top_tier: SourceTier,
    pub sources: BTreeMap<String, FieldSource>,
    pub disagreements: Vec<FieldDisagreement>,
    /// Every member's value per spec field and extra, in trust order
    #[serde(default)]
    pub observations: BTreeMap<String, Vec<SourcedValue>>,
    /// Free-form extras; the most trusted member wins per name
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
    /// The model could not be identified
    pub unresolved: bool,
}

impl BoardGroup {
    /// The boards-table row for this group.
    pub fn to_row(&self) -> BoardRow {
        BoardRow {
            board_key: self.board.board_key.clone(),
            brand: self.board.brand.clone(),
            model: self.board.model.clone(),
            gender: self.board.gender,
            specs: self.board.specs.clone(),
            spec_source: self.top_tier,
            extras: self.extras.clone(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A record with its derived identity, ready for grouping.
struct Member<'a> {
    record: &'a ScrapedBoard,
    tier: SourceTier,
    brand: String,
    model: String,
    gender: Gender,
    condition: Condition,
    specs: BoardSpecs,
}

/// Group `records` into canonical boards keyed by `brand|model|gender`.
#[instrument(skip(records, normalizer), level = "debug")]
pub fn identify_boards(
    records: &[ScrapedBoard],
    normalizer: &Normalizer,
) -> BTreeMap<BoardKey, BoardGroup> {
    let identified: Vec<(BoardKey, Member<'_>)> = records
        .par_iter()
        .map(|record| identify(record, normalizer))
        .collect();

    let mut grouped: BTreeMap<BoardKey, Vec<Member<'_>>> = BTreeMap::new();
    for (key, member) in identified {
        grouped.entry(key).or_default().push(member);
    }

    let groups: BTreeMap<BoardKey, BoardGroup> = grouped
        .into_par_iter()
        .map(|(key, members)| {
            let group = resolve_group(&key, members);
            (key, group)
        })
        .collect();

    debug!(
        "Coalesced {} records into {} boards",
        records.len(),
        groups.len()
    );
    groups
}

fn identify<'a>(record: &'a ScrapedBoard, normalizer: &Normalizer) -> (BoardKey, Member<'a>) {
    let identity = BoardIdentifier::new(IdentityInput::from(record), normalizer);
    let key = identity.key();
    let member = Member {
        record,
        tier: record.tier(),
        brand: identity.brand().canonical_name.clone(),
        model: identity.model().to_string(),
        gender: identity.gender(),
        condition: identity.condition(),
        specs: record_specs(record, identity.year()),
    };
    (key, member)
}

/// Spec fields one record contributes.
pub fn record_specs(record: &ScrapedBoard, year: Option<u16>) -> BoardSpecs {
    let (ability_level_min, ability_level_max) = match record
        .ability_level
        .as_deref()
        .and_then(AbilityLevel::parse_range)
    {
        Some((min, max)) => (Some(min), Some(max)),
        None => (None, None),
    };
    BoardSpecs {
        year,
        flex: record.flex,
        profile: non_empty(&record.profile),
        shape: non_empty(&record.shape),
        category: non_empty(&record.category),
        terrain_scores: terrain_scores(&record.extras),
        ability_level_min,
        ability_level_max,
        msrp_usd: record.msrp_usd,
        description: non_empty(&record.description),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Extras named `terrain.<kind>` or `terrain_<kind>` with a numeric value.
fn terrain_scores(extras: &BTreeMap<String, String>) -> BTreeMap<String, f32> {
    extras
        .iter()
        .filter_map(|(name, value)| {
            let kind = name
                .strip_prefix("terrain.")
                .or_else(|| name.strip_prefix("terrain_"))?;
            let score = value.trim().parse::<f32>().ok()?;
            Some((kind.to_lowercase(), score))
        })
        .collect()
}

fn resolve_group(key: &BoardKey, mut members: Vec<Member<'_>>) -> BoardGroup {
    let source_ids: Vec<String> = members
        .iter()
        .map(|member| member.record.source_id.clone())
        .collect();
    let listings = merge_listings(key, &members);

    // Stable sort keeps input order within a tier
    members.sort_by(|a, b| b.tier.cmp(&a.tier));
    let leader = &members[0];

    let mut specs = BoardSpecs::default();
    for member in &members {
        specs.fill_missing(&member.specs);
    }
    let (sources, disagreements, mut observations) = summarize_sources(&members);
    let mut extras = BTreeMap::new();
    for member in &members {
        for (name, value) in member_extras(member.record) {
            extras.entry(name.clone()).or_insert_with(|| value.clone());
            observations
                .entry(name.clone())
                .or_default()
                .push(sourced(member, value.clone()));
        }
    }

    let unresolved = leader.model.eq_ignore_ascii_case(crate::identity::UNRESOLVED_MODEL);
    if unresolved {
        warn!(
            "Unresolved board identity {} from {} records",
            key,
            members.len()
        );
    }
    for disagreement in &disagreements {
        debug!(
            "Field {} disagrees across tiers for {}",
            disagreement.field, key
        );
    }

    BoardGroup {
        board: Board {
            board_key: key.clone(),
            brand: leader.brand.clone(),
            model: leader.model.clone(),
            gender: leader.gender,
            specs,
            listings,
        },
        members: source_ids,
        top_tier: leader.tier,
        sources,
        disagreements,
        observations,
        extras,
        unresolved,
    }
}

fn merge_listings(key: &BoardKey, members: &[Member<'_>]) -> Vec<Listing> {
    let mut listings = Vec::new();
    for member in members {
        let combo = normalize::combo_contents(&member.record.raw_model_title);
        for listing in &member.record.listings {
            let mut listing = listing.clone();
            listing.board_key = key.to_string();
            if listing.condition == Condition::Unknown {
                listing.condition = member.condition;
            }
            listing.gender = member.gender;
            if listing.combo_contents.is_none() {
                listing.combo_contents.clone_from(&combo);
            }
            listings.push(listing);
        }
    }
    listings
}

/// Extras that are not already captured as terrain scores.
fn member_extras(record: &ScrapedBoard) -> impl Iterator<Item = (&String, &String)> {
    let scored = terrain_scores(&record.extras);
    record.extras.iter().filter(move |(name, _)| {
        let kind = name
            .strip_prefix("terrain.")
            .or_else(|| name.strip_prefix("terrain_"));
        !kind.is_some_and(|kind| scored.contains_key(&kind.to_lowercase()))
    })
}

fn sourced(member: &Member<'_>, value: String) -> SourcedValue {
    SourcedValue {
        tier: member.tier,
        source_id: member.record.source_id.clone(),
        value,
        source_url: (!member.record.source_url.is_empty())
            .then(|| member.record.source_url.clone()),
    }
}

type SourceSummary = (
    BTreeMap<String, FieldSource>,
    Vec<FieldDisagreement>,
    BTreeMap<String, Vec<SourcedValue>>,
);

/// Winning source per field, cross-tier disagreements, and every observed value.
/// `members` must already be in trust order.
fn summarize_sources(members: &[Member<'_>]) -> SourceSummary {
    let mut sources: BTreeMap<String, FieldSource> = BTreeMap::new();
    let mut observed: BTreeMap<String, Vec<SourcedValue>> = BTreeMap::new();

    for member in members {
        for (field, value) in member.specs.field_values() {
            let value = sourced(member, value);
            sources.entry(field.clone()).or_insert_with(|| FieldSource {
                tier: member.tier,
                source_id: value.source_id.clone(),
                source_url: value.source_url.clone(),
                disagreement: false,
            });
            observed.entry(field).or_default().push(value);
        }
    }

    let mut disagreements = Vec::new();
    for (field, values) in &observed {
        if !spans_tiers_with_distinct_values(values) {
            continue;
        }
        if let Some(source) = sources.get_mut(field) {
            source.disagreement = true;
        }
        disagreements.push(FieldDisagreement {
            field: field.clone(),
            values: values.clone(),
        });
    }
    (sources, disagreements, observed)
}

fn spans_tiers_with_distinct_values(values: &[SourcedValue]) -> bool {
    let distinct: HashSet<String> = values
        .iter()
        .map(|value| value.value.trim().to_lowercase())
        .collect();
    if distinct.len() < 2 {
        return false;
    }
    let mut tiers_per_value: HashMap<String, HashSet<SourceTier>> = HashMap::new();
    for value in values {
        tiers_per_value
            .entry(value.value.trim().to_lowercase())
            .or_default()
            .insert(value.tier);
    }
    let tiers: HashSet<SourceTier> = tiers_per_value.values().flatten().copied().collect();
    tiers.len() >= 2
}
