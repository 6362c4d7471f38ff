//! Board filters.
//!
//! A filter field set to `None` accepts everything. A board whose value for a
//! filtered field is absent or not one of the recognized terms has no opinion
//! and passes too.

use crate::model::{AbilityLevel, Board, Gender};
use serde::{Deserialize, Serialize};

const SHAPES: &[&str] = &["twin", "directional twin", "directional", "tapered"];
const PROFILES: &[&str] = &[
    "camber",
    "rocker",
    "flat",
    "hybrid camber",
    "hybrid rocker",
];
const CATEGORIES: &[&str] = &["all-mountain", "freestyle", "freeride", "powder", "park"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardFilter {
    #[serde(default)]
    pub ability: Option<AbilityLevel>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl BoardFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ability(mut self, level: AbilityLevel) -> Self {
        self.ability = Some(level);
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_shape(mut self, shape: &str) -> Self {
        self.shape = Some(shape.to_string());
        self
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = Some(profile.to_string());
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn matches(&self, board: &Board) -> bool {
        if let Some(level) = self.ability {
            if !ability_matches(
                board.specs.ability_level_min,
                board.specs.ability_level_max,
                level,
            ) {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if board.gender != gender {
                return false;
            }
        }
        enumerated_matches(self.shape.as_deref(), board.specs.shape.as_deref(), SHAPES)
            && enumerated_matches(
                self.profile.as_deref(),
                board.specs.profile.as_deref(),
                PROFILES,
            )
            && enumerated_matches(
                self.category.as_deref(),
                board.specs.category.as_deref(),
                CATEGORIES,
            )
    }

    /// Boards from `boards` that pass, in input order.
    pub fn apply<'a>(&self, boards: &'a [Board]) -> Vec<&'a Board> {
        boards.iter().filter(|board| self.matches(board)).collect()
    }
}

/// Whether a board rated `[min, max]` suits a rider at `level`.
pub fn ability_matches(
    min: Option<AbilityLevel>,
    max: Option<AbilityLevel>,
    level: AbilityLevel,
) -> bool {
    match (min, max) {
        (None, None) => true,
        (Some(min), Some(max)) => min <= level && level <= max,
        (Some(point), None) | (None, Some(point)) => point == level,
    }
}

fn canonical_term(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace(['_', '/'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("all mountain", "all-mountain")
}

fn enumerated_matches(wanted: Option<&str>, actual: Option<&str>, vocabulary: &[&str]) -> bool {
    let (Some(wanted), Some(actual)) = (wanted, actual) else {
        return true;
    };
    let actual = canonical_term(actual);
    if !vocabulary.contains(&actual.as_str()) {
        return true;
    }
    canonical_term(wanted) == actual
}
