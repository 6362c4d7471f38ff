//! # Key Builder
//!
//! The canonical `brand|model|gender` composite identifier. The format is stable:
//! it is the storage primary key and the coalescing map key, and other subsystems
//! split it on `|`.

use crate::model::Gender;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const KEY_SEPARATOR: char = '|';

/// Lowercase `brand|model|gender` identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardKey(String);

impl BoardKey {
    /// Build a key from its components. A pure function of its inputs.
    pub fn build(brand: &str, model: &str, gender: Gender) -> Self {
        BoardKey(format!(
            "{}{sep}{}{sep}{}",
            component(brand),
            component(model),
            gender.as_str(),
            sep = KEY_SEPARATOR
        ))
    }

    /// Split a stored key back into `(brand, model, gender)`.
    pub fn parse(value: &str) -> Result<(String, String, Gender)> {
        let parts: Vec<&str> = value.split(KEY_SEPARATOR).collect();
        if parts.len() != 3 {
            bail!("board key '{}' must have exactly three '|' separated parts", value);
        }
        let gender = match Gender::parse(parts[2]) {
            Some(gender) => gender,
            None => bail!("board key '{}' has unknown gender '{}'", value, parts[2]),
        };
        Ok((parts[0].to_string(), parts[1].to_string(), gender))
    }

    /// Wrap an already-built key string, validating its shape.
    pub fn from_stored(value: &str) -> Result<Self> {
        let (brand, model, gender) = Self::parse(value)?;
        Ok(Self::build(&brand, &model, gender))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn brand(&self) -> &str {
        self.0.split(KEY_SEPARATOR).next().unwrap_or_default()
    }

    pub fn model(&self) -> &str {
        self.0.split(KEY_SEPARATOR).nth(1).unwrap_or_default()
    }
}

fn component(value: &str) -> String {
    value
        .replace(KEY_SEPARATOR, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl fmt::Display for BoardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BoardKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
