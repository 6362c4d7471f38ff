//! Unified configuration for boardcanon.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (boardcanon.toml)
//! ```toml
//! [normalizer]
//! rules_path = "/etc/boardcanon/rules.toml"
//! keep_profile = false
//!
//! [storage]
//! path = "/var/lib/boardcanon"
//! board_cache_capacity = 20000
//!
//! [enrichment]
//! cache_capacity = 4096
//! ```
//!
//! Environment variables use the `BOARDCANON_` prefix with `__` separating
//! sections, so multi-word keys keep their underscores, e.g.
//! `BOARDCANON_STORAGE__BOARD_CACHE_CAPACITY=4096`.

mod defaults;

pub use defaults::*;

use crate::normalize::NormalizeOptions;
use crate::persistence::PersistentOpenOptions;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardCanonConfig {
    /// Model-name normalization
    pub normalizer: NormalizerConfig,
    /// Catalog storage
    pub storage: StorageConfig,
    /// Spec enrichment
    pub enrichment: EnrichmentConfig,
}

impl BoardCanonConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - CLI overrides to apply on top
    pub fn load(
        config_path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment =
            Figment::new().merge(Serialized::defaults(BoardCanonConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with BOARDCANON_ prefix
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));

        // Layer 3: CLI overrides
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }

    /// Load from environment and optional config file only (no CLI overrides)
    pub fn from_env(config_path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            keep_profile: self.normalizer.keep_profile,
        }
    }

    pub fn open_options(&self) -> PersistentOpenOptions {
        PersistentOpenOptions {
            repair: self.storage.repair,
            board_cache_capacity: self.storage.board_cache_capacity,
        }
    }
}

/// Normalizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Extra rule table (TOML or JSON) merged over the built-in rules
    pub rules_path: Option<PathBuf>,
    /// Keep profile designators in model names
    pub keep_profile: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            keep_profile: DEFAULT_KEEP_PROFILE,
        }
    }
}

/// RocksDB storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database directory
    pub path: PathBuf,
    /// Board rows held in the read cache
    pub board_cache_capacity: usize,
    /// Run repair on open
    pub repair: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORAGE_PATH),
            board_cache_capacity: DEFAULT_BOARD_CACHE_CAPACITY,
            repair: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub cache_capacity: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_ENRICHMENT_CACHE_CAPACITY,
        }
    }
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<NormalizerOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_profile: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<bool>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
