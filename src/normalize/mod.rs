//! # Model Normalizer
//!
//! Reduces a raw product title to a comparison-ready base model string through an
//! ordered list of named, pure steps. Brand-specific behavior comes only from the
//! compiled [`RuleTable`]; the engine itself knows nothing about any brand.
//!
//! `normalize(normalize(x)) == normalize(x)` for every input the pipeline
//! recognizes, and no step can fail.

pub mod rules;
mod steps;

pub use rules::{BrandRules, CompiledRules, Correction, RuleError, RuleTable, ShapeModifier};

use crate::brand;
use crate::model::BrandIdentifier;
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use rules::CompiledBrandRules;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Trace entry name used when the input short-circuits the pipeline.
pub const EARLY_RETURN: &str = "early-return";

/// Options accepted by [`Normalizer::normalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Keep trailing contour designators such as `Camber`
    pub keep_profile: bool,
}

/// One `(step, intermediate result)` pair of a traced run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: String,
    pub result: String,
}

/// What a step sees besides the text.
pub struct StepContext<'a> {
    pub brand: Option<&'a BrandIdentifier>,
    pub rules: &'a CompiledRules,
    pub options: NormalizeOptions,
}

impl StepContext<'_> {
    /// Compiled rules for the current brand, if the table has any.
    pub fn brand_rules(&self) -> Option<&CompiledBrandRules> {
        self.brand
            .and_then(|brand| self.rules.for_brand(&brand.manufacturer_slug))
    }
}

type StepFn = dyn Fn(&str, &StepContext<'_>) -> String + Send + Sync;

/// Which brands a step runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepScope {
    AllBrands,
    /// Manufacturer slugs
    Brands(Vec<String>),
}

/// A named pipeline step.
#[derive(Clone)]
pub struct Step {
    name: String,
    scope: StepScope,
    run: Arc<StepFn>,
}

impl Step {
    pub fn new<F>(name: &str, run: F) -> Self
    where
        F: Fn(&str, &StepContext<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            scope: StepScope::AllBrands,
            run: Arc::new(run),
        }
    }

    /// A step that only runs for the given manufacturer slugs.
    pub fn scoped<F>(name: &str, slugs: &[&str], run: F) -> Self
    where
        F: Fn(&str, &StepContext<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            scope: StepScope::Brands(slugs.iter().map(|slug| slug.to_string()).collect()),
            ..Self::new(name, run)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &StepScope {
        &self.scope
    }

    fn applies_to(&self, brand: Option<&BrandIdentifier>) -> bool {
        match &self.scope {
            StepScope::AllBrands => true,
            StepScope::Brands(slugs) => {
                brand.is_some_and(|brand| slugs.contains(&brand.manufacturer_slug))
            }
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Compiled rules plus the ordered step list. Immutable once built and safe to
/// share across threads.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: CompiledRules,
    steps: Vec<Step>,
    defaults: NormalizeOptions,
}

static DEFAULT_NORMALIZER: Lazy<Normalizer> =
    Lazy::new(|| Normalizer::builtin().expect("builtin normalization rules compile"));

impl Normalizer {
    /// Compile `table` and attach the canonical step list.
    pub fn new(table: &RuleTable) -> Result<Self, RuleError> {
        Ok(Self {
            rules: table.compile()?,
            steps: steps::builtin_steps(),
            defaults: NormalizeOptions::default(),
        })
    }

    /// Options used when identity derivation normalizes a title.
    pub fn with_defaults(mut self, options: NormalizeOptions) -> Self {
        self.defaults = options;
        self
    }

    pub fn defaults(&self) -> NormalizeOptions {
        self.defaults
    }

    pub fn builtin() -> Result<Self, RuleError> {
        Self::new(&RuleTable::builtin()?)
    }

    /// Shared normalizer over the shipped rule table.
    pub fn shared() -> &'static Normalizer {
        &DEFAULT_NORMALIZER
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }

    /// Insert a custom step right after the named one.
    pub fn insert_step_after(&mut self, after: &str, step: Step) -> Result<()> {
        let index = self
            .steps
            .iter()
            .position(|existing| existing.name == after)
            .ok_or_else(|| anyhow!("no normalization step named '{}'", after))?;
        self.steps.insert(index + 1, step);
        Ok(())
    }

    pub fn normalize(
        &self,
        raw: &str,
        brand: Option<&BrandIdentifier>,
        options: NormalizeOptions,
    ) -> String {
        self.run(raw, brand, options, None)
    }

    /// Like [`normalize`](Self::normalize), returning every intermediate result.
    /// The last entry holds the final model.
    pub fn normalize_traced(
        &self,
        raw: &str,
        brand: Option<&BrandIdentifier>,
        options: NormalizeOptions,
    ) -> Vec<TraceEntry> {
        let mut trace = Vec::with_capacity(self.steps.len());
        self.run(raw, brand, options, Some(&mut trace));
        trace
    }

    fn run(
        &self,
        raw: &str,
        brand: Option<&BrandIdentifier>,
        options: NormalizeOptions,
        mut trace: Option<&mut Vec<TraceEntry>>,
    ) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(brand::UNKNOWN_BRAND) {
            if let Some(trace) = trace {
                trace.push(TraceEntry {
                    step: EARLY_RETURN.to_string(),
                    result: trimmed.to_string(),
                });
            }
            return trimmed.to_string();
        }

        let ctx = StepContext {
            brand,
            rules: &self.rules,
            options,
        };
        let mut current = trimmed.to_string();
        for step in &self.steps {
            if step.applies_to(brand) {
                current = (step.run)(&current, &ctx);
            }
            if let Some(trace) = trace.as_deref_mut() {
                trace.push(TraceEntry {
                    step: step.name.clone(),
                    result: current.clone(),
                });
            }
        }
        current
    }
}

/// Normalize with the shared rules, canonicalizing `brand` first.
pub fn normalize(raw: &str, brand: Option<&str>) -> String {
    let brand = brand.map(brand::canonicalize);
    Normalizer::shared().normalize(raw, brand.as_ref(), NormalizeOptions::default())
}

/// Bundled items named in a combo title, if any.
pub fn combo_contents(raw_title: &str) -> Option<String> {
    steps::combo_contents(raw_title)
}
