//! # Brand Canonicalizer
//!
//! Maps arbitrary brand spellings to one canonical brand name and manufacturer slug.
//! Lookup is total: unknown brands pass through title-cased and an empty brand
//! resolves to `Unknown`.

use crate::model::BrandIdentifier;
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const UNKNOWN_BRAND: &str = "Unknown";

/// A known brand with its accepted spellings.
#[derive(Debug, Clone, Copy)]
pub struct BrandEntry {
    pub canonical: &'static str,
    pub slug: &'static str,
    /// Spellings that do not fold to the canonical name on their own
    pub aliases: &'static [&'static str],
    /// Fragments of a multi-word brand that retailers leave at the start of titles
    pub prefix_leaks: &'static [&'static str],
}

pub const KNOWN_BRANDS: &[BrandEntry] = &[
    BrandEntry { canonical: "Burton", slug: "burton", aliases: &[], prefix_leaks: &[] },
    BrandEntry {
        canonical: "Lib Tech",
        slug: "lib-tech",
        aliases: &["Lib Technologies", "Lib Tech Snowboards", "Libtech Boards"],
        prefix_leaks: &["Tech"],
    },
    BrandEntry { canonical: "GNU", slug: "gnu", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "CAPiTA", slug: "capita", aliases: &["Capita Supply"], prefix_leaks: &[] },
    BrandEntry { canonical: "Jones", slug: "jones", aliases: &["Jones Snowboards"], prefix_leaks: &[] },
    BrandEntry { canonical: "Ride", slug: "ride", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "K2", slug: "k2", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Salomon", slug: "salomon", aliases: &[], prefix_leaks: &[] },
    BrandEntry {
        canonical: "Never Summer",
        slug: "never-summer",
        aliases: &["Never Summer Industries"],
        prefix_leaks: &["Summer"],
    },
    BrandEntry { canonical: "Arbor", slug: "arbor", aliases: &["Arbor Collective"], prefix_leaks: &[] },
    BrandEntry { canonical: "Rossignol", slug: "rossignol", aliases: &["Rossi"], prefix_leaks: &[] },
    BrandEntry { canonical: "Nitro", slug: "nitro", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Yes", slug: "yes", aliases: &["Yes Inc"], prefix_leaks: &[] },
    BrandEntry { canonical: "Bataleon", slug: "bataleon", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Rome", slug: "rome", aliases: &["Rome SDS"], prefix_leaks: &["SDS"] },
    BrandEntry {
        canonical: "Dinosaurs Will Die",
        slug: "dinosaurs-will-die",
        aliases: &["DWD"],
        prefix_leaks: &["Will Die"],
    },
    BrandEntry { canonical: "Korua", slug: "korua", aliases: &["Korua Shapes"], prefix_leaks: &["Shapes"] },
    BrandEntry { canonical: "Weston", slug: "weston", aliases: &["Weston Backcountry"], prefix_leaks: &[] },
    BrandEntry { canonical: "Gentemstick", slug: "gentemstick", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Sims", slug: "sims", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Roxy", slug: "roxy", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Head", slug: "head", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Public", slug: "public", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Slash", slug: "slash", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Niche", slug: "niche", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Amplid", slug: "amplid", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Telos", slug: "telos", aliases: &[], prefix_leaks: &[] },
    BrandEntry { canonical: "Season", slug: "season", aliases: &["Season Eqpt"], prefix_leaks: &[] },
];

/// Trailing words that brands and retailers append to the brand name.
const BRAND_SUFFIX_NOISE: &[&str] = &[
    "snowboards",
    "snowboarding",
    "snowboard",
    "snowboard co",
    "snowboard company",
    "boards",
];

static BRAND_INDEX: Lazy<HashMap<String, &'static BrandEntry>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for entry in KNOWN_BRANDS {
        index.insert(compact(entry.canonical), entry);
        for alias in entry.aliases {
            index.insert(compact(alias), entry);
        }
    }
    index
});

/// Resolve a raw brand spelling. Never fails; same input always yields same output.
pub fn canonicalize(raw_brand: &str) -> BrandIdentifier {
    let trimmed = raw_brand.trim();
    if trimmed.is_empty() {
        return BrandIdentifier {
            raw_input: raw_brand.to_string(),
            canonical_name: UNKNOWN_BRAND.to_string(),
            manufacturer_slug: "unknown".to_string(),
        };
    }

    if let Some(entry) = lookup(trimmed) {
        return BrandIdentifier {
            raw_input: raw_brand.to_string(),
            canonical_name: entry.canonical.to_string(),
            manufacturer_slug: entry.slug.to_string(),
        };
    }

    let canonical_name = title_case(trimmed);
    BrandIdentifier {
        raw_input: raw_brand.to_string(),
        manufacturer_slug: slugify(&canonical_name),
        canonical_name,
    }
}

/// Find the known-brand entry for a raw spelling, if any.
pub fn lookup(raw_brand: &str) -> Option<&'static BrandEntry> {
    let folded = fold(raw_brand);
    if let Some(entry) = BRAND_INDEX.get(&folded.replace(' ', "")) {
        return Some(*entry);
    }
    // Retry with trailing "snowboards"-style noise removed
    for suffix in BRAND_SUFFIX_NOISE {
        if let Some(stem) = folded.strip_suffix(suffix) {
            let stem = stem.trim();
            if stem.is_empty() {
                continue;
            }
            if let Some(entry) = BRAND_INDEX.get(&stem.replace(' ', "")) {
                return Some(*entry);
            }
        }
    }
    None
}

/// Known entry for a canonical brand name, used by the normalizer.
pub fn entry_for(brand: &BrandIdentifier) -> Option<&'static BrandEntry> {
    KNOWN_BRANDS
        .iter()
        .find(|entry| entry.slug == brand.manufacturer_slug)
}

/// Lowercase, punctuation removed, whitespace collapsed.
fn fold(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn compact(value: &str) -> String {
    fold(value).replace(' ', "")
}

pub(crate) fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn slugify(value: &str) -> String {
    fold(value).replace(' ', "-")
}
