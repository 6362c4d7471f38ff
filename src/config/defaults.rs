//! Default constants for boardcanon configuration.
//!
//! All magic numbers are centralized here with documentation.

// =============================================================================
// Environment
// =============================================================================

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "BOARDCANON_";

/// Separator between section and key in environment variable names
pub const ENV_SEPARATOR: &str = "__";

// =============================================================================
// Normalizer Defaults
// =============================================================================

/// Keep profile designators (Camber, Rocker, ...) in normalized model names.
/// Off by default so profile variants collapse onto the base model.
pub const DEFAULT_KEEP_PROFILE: bool = false;

/// Smallest trailing number treated as a board length in centimeters.
pub const MIN_LENGTH_CM: u32 = 130;

/// Largest trailing number treated as a board length in centimeters.
pub const MAX_LENGTH_CM: u32 = 199;

// =============================================================================
// Storage Defaults (RocksDB)
// =============================================================================

/// Default on-disk location of the catalog database
pub const DEFAULT_STORAGE_PATH: &str = "./data/boardcanon";

/// Board rows kept in the persistent store's read cache
pub const DEFAULT_BOARD_CACHE_CAPACITY: usize = 10_000;

/// On-disk storage format version, bumped on incompatible layout changes
pub const STORAGE_FORMAT_VERSION: u32 = 1;

// =============================================================================
// Enrichment Defaults
// =============================================================================

/// Confirmed enrichment hits kept in memory
/// Misses and failures are never cached, so this only bounds successful lookups.
pub const DEFAULT_ENRICHMENT_CACHE_CAPACITY: usize = 2_048;
