//! # Rule Table
//!
//! Declarative, brand-scoped normalization rules. The table is plain data
//! (`serde`), loaded at startup from the shipped TOML or an override file, and
//! compiled once into regexes. The step engine never names a brand itself.

use figment::{
    providers::{Format, Toml},
    Figment,
};
use hashbrown::HashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const BUILTIN_RULES: &str = include_str!("builtin_rules.toml");

/// Regex correction applied to one brand's titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub pattern: String,
    pub replacement: String,
}

/// Shape word that moves to the end of the model and takes a canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeModifier {
    pub token: String,
    pub canonical: String,
}

/// Rules for one manufacturer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandRules {
    pub corrections: Vec<Correction>,
    pub riders: Vec<String>,
    pub shape_modifiers: Vec<ShapeModifier>,
    /// Lowercase models whose leading shape word is part of the name
    pub shape_protected: Vec<String>,
    /// Lowercase models that begin with a gender word, e.g. `ladies choice`
    pub gender_protected: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    /// Lowercase models whose trailing profile word is a real variant marker
    pub profile_keep: Vec<String>,
    /// Brand-specific profile designators stripped in addition to the global list
    pub profile_extra: Vec<String>,
}

impl BrandRules {
    fn merge(&mut self, other: BrandRules) {
        self.corrections.extend(other.corrections);
        extend_unique(&mut self.riders, other.riders);
        self.shape_modifiers.extend(other.shape_modifiers);
        extend_unique(&mut self.shape_protected, other.shape_protected);
        extend_unique(&mut self.gender_protected, other.gender_protected);
        self.aliases.extend(other.aliases);
        extend_unique(&mut self.profile_keep, other.profile_keep);
        extend_unique(&mut self.profile_extra, other.profile_extra);
    }
}

/// The whole rule table: global lists plus per-brand sections keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    pub profile_designators: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub brands: BTreeMap<String, BrandRules>,
}

impl RuleTable {
    /// The rules shipped with the crate.
    pub fn builtin() -> Result<Self, RuleError> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RuleError> {
        Figment::from(Toml::string(text))
            .extract()
            .map_err(RuleError::from)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RuleError> {
        serde_json::from_str(text).map_err(|e| RuleError::new(format!("invalid rule JSON: {}", e)))
    }

    /// Load a rule file, choosing the format by extension (`.json` or TOML).
    pub fn from_path(path: &Path) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RuleError::new(format!("cannot read rule file {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Layer `other` over `self`: lists are extended, alias entries in `other` win.
    pub fn merge(mut self, other: RuleTable) -> Self {
        extend_unique(&mut self.profile_designators, other.profile_designators);
        self.aliases.extend(other.aliases);
        for (slug, rules) in other.brands {
            self.brands.entry(slug).or_default().merge(rules);
        }
        self
    }

    /// Compile every pattern. Invalid patterns fail here, never during normalization.
    pub fn compile(&self) -> Result<CompiledRules, RuleError> {
        let mut brands = HashMap::new();
        for (slug, rules) in &self.brands {
            brands.insert(slug.clone(), compile_brand(slug, rules)?);
        }
        Ok(CompiledRules {
            profile_designators: lower_sorted_by_length(&self.profile_designators),
            aliases: lower_keys(&self.aliases),
            brands,
        })
    }
}

/// Rules ready for the step engine.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    /// Lowercase, longest first
    pub profile_designators: Vec<String>,
    pub aliases: HashMap<String, String>,
    pub brands: HashMap<String, CompiledBrandRules>,
}

impl CompiledRules {
    pub fn for_brand(&self, slug: &str) -> Option<&CompiledBrandRules> {
        self.brands.get(slug)
    }
}

#[derive(Debug, Clone)]
pub struct CompiledBrandRules {
    pub corrections: Vec<(Regex, String)>,
    pub riders: Vec<RiderPattern>,
    pub shape_modifiers: Vec<ShapeModifier>,
    pub shape_protected: Vec<String>,
    /// Word sequences of `gender_protected`, longest first
    pub gender_protected: Vec<Vec<String>>,
    pub aliases: HashMap<String, String>,
    /// Alias keys for scoped-prefix matching, longest first
    pub alias_prefixes: Vec<(String, String)>,
    pub profile_keep: Vec<String>,
    pub profile_extra: Vec<String>,
}

/// Compiled prefix, suffix and `by <rider>` infix forms of one rider name.
#[derive(Debug, Clone)]
pub struct RiderPattern {
    pub name: String,
    pub prefix: Regex,
    pub suffix: Regex,
    pub infix: Regex,
}

fn compile_brand(slug: &str, rules: &BrandRules) -> Result<CompiledBrandRules, RuleError> {
    let mut corrections = Vec::with_capacity(rules.corrections.len());
    for correction in &rules.corrections {
        let regex = Regex::new(&correction.pattern).map_err(|e| {
            RuleError::for_brand(slug, format!("bad correction '{}': {}", correction.pattern, e))
        })?;
        corrections.push((regex, correction.replacement.clone()));
    }

    let mut riders = Vec::with_capacity(rules.riders.len());
    for name in &rules.riders {
        riders.push(compile_rider(slug, name)?);
    }

    let aliases = lower_keys(&rules.aliases);
    let mut alias_prefixes: Vec<(String, String)> =
        aliases.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    alias_prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    let shape_modifiers = rules
        .shape_modifiers
        .iter()
        .map(|modifier| ShapeModifier {
            token: modifier.token.to_lowercase(),
            canonical: modifier.canonical.clone(),
        })
        .collect();

    let mut gender_protected: Vec<Vec<String>> = rules
        .gender_protected
        .iter()
        .map(|model| model.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
        .filter(|words| !words.is_empty())
        .collect();
    gender_protected.sort_by(|a, b| b.len().cmp(&a.len()));

    Ok(CompiledBrandRules {
        corrections,
        riders,
        shape_modifiers,
        shape_protected: rules.shape_protected.iter().map(|s| s.to_lowercase()).collect(),
        gender_protected,
        aliases,
        alias_prefixes,
        profile_keep: rules.profile_keep.iter().map(|s| s.to_lowercase()).collect(),
        profile_extra: lower_sorted_by_length(&rules.profile_extra),
    })
}

fn compile_rider(slug: &str, name: &str) -> Result<RiderPattern, RuleError> {
    let words: Vec<String> = name
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return Err(RuleError::for_brand(slug, "empty rider name".to_string()));
    }
    let body = words.join(r"[.\s]+");
    let build = |pattern: String| {
        Regex::new(&pattern)
            .map_err(|e| RuleError::for_brand(slug, format!("bad rider '{}': {}", name, e)))
    };
    Ok(RiderPattern {
        name: name.to_string(),
        prefix: build(format!(r"(?i)^{}(?:'s)?\s+", body))?,
        suffix: build(format!(r"(?i)\s+(?:-\s*)?{}$", body))?,
        infix: build(format!(r"(?i)\s+by\s+{}\b", body))?,
    })
}

fn lower_keys(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect()
}

fn lower_sorted_by_length(values: &[String]) -> Vec<String> {
    let mut lowered: Vec<String> = values.iter().map(|v| v.to_lowercase()).collect();
    lowered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    lowered.dedup();
    lowered
}

fn extend_unique(target: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

/// Error loading or compiling a rule table.
#[derive(Debug)]
pub struct RuleError {
    pub brand: Option<String>,
    pub message: String,
}

impl RuleError {
    fn new(message: String) -> Self {
        Self { brand: None, message }
    }

    fn for_brand(slug: &str, message: String) -> Self {
        Self {
            brand: Some(slug.to_string()),
            message,
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.brand {
            Some(brand) => write!(f, "rule error [{}]: {}", brand, self.message),
            None => write!(f, "rule error: {}", self.message),
        }
    }
}

impl std::error::Error for RuleError {}

impl From<figment::Error> for RuleError {
    fn from(e: figment::Error) -> Self {
        Self::new(e.to_string())
    }
}
