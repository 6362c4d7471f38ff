//! Built-in normalization steps, in pipeline order.
//!
//! Every step is a pure `(text, context) -> text` function. A step that finds
//! nothing to do returns its input unchanged; none of them can fail.

use super::{Step, StepContext};
use crate::brand::{self, UNKNOWN_BRAND};
use crate::config::{MAX_LENGTH_CM, MIN_LENGTH_CM};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Length tokens outside this range are model numbers, not board sizes.
const BOARD_LENGTH_CM: std::ops::RangeInclusive<u32> = MIN_LENGTH_CM..=MAX_LENGTH_CM;

/// Words left behind by rider stripping that do not identify a model.
const GENERIC_LEFTOVERS: &[&str] = &["pro", "pro model", "signature", "signature series", "model"];

const GENDER_WORDS: &[&str] = &[
    "women's", "womens", "women", "woman's", "womans", "wmns", "wms", "ladies", "ladies'",
    "men's", "mens", "men", "kids'", "kids", "kid's", "youth", "boys'", "boys", "boy's",
    "girls'", "girls", "girl's", "unisex",
];

static COMBO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*(?:\+|\bw/|&|\band\b|\bwith\b)\s*[^+]*?\b(?:bindings?|package|combo|bundle)\b.*$",
    )
    .unwrap()
});

static BARE_COMBO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-(\[]?\s*\b(?:combo|bundle)\b.*$").unwrap());

static COMBO_JOINER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:\+|w/|&|and\b|with\b)\s*").unwrap());

static RETAIL_TAGS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\s*[(\[]\s*(?:closeout|blem(?:ished)?|sale|on sale|clearance|demo|used|outlet|b-grade)\s*[)\]]",
        r"(?i)\s+-\s*(?:closeout|blem(?:ished)?|sale|clearance|demo|used|outlet)\b",
        r"(?i)\b(?:blemished|blem|closeout|clearance)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static CATEGORY_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsnow\s*boards?\b").unwrap());

static YEAR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:19|20)\d{2}\s*/\s*(?:19|20)?\d{2}\b",
        r"\b\d{2}/\d{2}\b",
        r"(?i)\b(?:FW|MY|SS)\s?\d{2}\b",
        r"\bW\d{2}\b",
        r"(?i)\b(?:19|20)\d{2}\s+(?:model|edition|release|season)\b",
        r"\s+-\s*(?:19|20)\d{2}\b",
        r"\(\s*(?:19|20)\d{2}\s*\)",
        r"\b(?:199\d|20[0-3]\d)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static LENGTH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{3})(?:cm|w|mw|uw)?$").unwrap());

static ACRONYM_DOTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z](?:\.[A-Za-z])+)\.?(\s|$)").unwrap());

static ABBREVIATION_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z])\.\s+([A-Z][a-z])").unwrap());

static EMPTY_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]").unwrap());

/// The canonical pipeline.
pub(crate) fn builtin_steps() -> Vec<Step> {
    vec![
        Step::new("strip-unicode-noise", strip_unicode_noise),
        Step::new("strip-combo-suffix", strip_combo_suffix),
        Step::new("pipe-to-space", pipe_to_space),
        Step::new("strip-retail-tags", strip_retail_tags),
        Step::new("strip-category-word", strip_category_word),
        Step::new("strip-year", strip_year),
        Step::new("strip-length", strip_length),
        Step::new("strip-gender", strip_gender),
        Step::new("strip-brand-prefix", strip_brand_prefix),
        Step::new("brand-corrections", brand_corrections),
        Step::new("strip-rider-name", strip_rider_name),
        Step::new("relocate-shape-modifier", relocate_shape_modifier),
        Step::new("normalize-dots", normalize_dots),
        Step::new("hyphen-to-space", hyphen_to_space),
        Step::new("alias-lookup", alias_lookup),
        Step::new("strip-profile", strip_profile),
        Step::new("final-cleanup", final_cleanup),
    ]
}

pub(crate) fn strip_unicode_noise(text: &str, _ctx: &StepContext<'_>) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect()
}

pub(crate) fn strip_combo_suffix(text: &str, _ctx: &StepContext<'_>) -> String {
    let stripped = COMBO.replace(text, "");
    let stripped = BARE_COMBO.replace(&stripped, "");
    if stripped.trim().is_empty() {
        return text.to_string();
    }
    stripped.into_owned()
}

/// The bundled items named after the board in a combo title, e.g.
/// `"Cartel Bindings"` for `"Burton Custom + Cartel Bindings"`.
pub(crate) fn combo_contents(raw_title: &str) -> Option<String> {
    let found = COMBO.find(raw_title)?;
    let contents = COMBO_JOINER.replace(found.as_str(), "");
    let contents = contents.trim();
    if contents.is_empty() {
        None
    } else {
        Some(contents.to_string())
    }
}

pub(crate) fn pipe_to_space(text: &str, _ctx: &StepContext<'_>) -> String {
    text.replace('|', " ")
}

pub(crate) fn strip_retail_tags(text: &str, _ctx: &StepContext<'_>) -> String {
    let mut current = text.to_string();
    for pattern in RETAIL_TAGS.iter() {
        current = pattern.replace_all(&current, " ").into_owned();
    }
    current
}

pub(crate) fn strip_category_word(text: &str, _ctx: &StepContext<'_>) -> String {
    CATEGORY_WORD.replace_all(text, " ").into_owned()
}

pub(crate) fn strip_year(text: &str, _ctx: &StepContext<'_>) -> String {
    let mut current = text.to_string();
    for pattern in YEAR_PATTERNS.iter() {
        current = pattern.replace_all(&current, " ").into_owned();
    }
    current
}

pub(crate) fn strip_length(text: &str, _ctx: &StepContext<'_>) -> String {
    let mut kept = Vec::new();
    let mut after_length = false;
    for (index, token) in text.split_whitespace().enumerate() {
        if index > 0 && is_board_length(token) {
            after_length = true;
            continue;
        }
        // "158 cm"
        if after_length && token.eq_ignore_ascii_case("cm") {
            after_length = false;
            continue;
        }
        after_length = false;
        kept.push(token);
    }
    kept.join(" ")
}

/// A single size (`158`, `158W`, `156cm`) or a size run (`154/156/158`).
fn is_board_length(token: &str) -> bool {
    token.split('/').all(|part| {
        LENGTH_TOKEN
            .captures(part)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .is_some_and(|value| BOARD_LENGTH_CM.contains(&value))
    })
}

pub(crate) fn strip_gender(text: &str, ctx: &StepContext<'_>) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let protected = ctx
        .brand_rules()
        .map(|rules| rules.gender_protected.as_slice())
        .unwrap_or_default();

    let mut kept = Vec::with_capacity(tokens.len());
    let mut index = 0;
    while index < tokens.len() {
        let rest = &tokens[index..];
        if let Some(words) = protected.iter().find(|words| starts_with_words(rest, words)) {
            kept.extend_from_slice(&rest[..words.len()]);
            index += words.len();
            continue;
        }
        if !is_gender_token(rest[0]) {
            kept.push(rest[0]);
        }
        index += 1;
    }
    kept.join(" ")
}

fn starts_with_words(tokens: &[&str], words: &[String]) -> bool {
    tokens.len() >= words.len()
        && tokens
            .iter()
            .zip(words)
            .all(|(token, word)| token.to_lowercase() == *word)
}

fn is_gender_token(token: &str) -> bool {
    let bare = token
        .trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ',' | ':'))
        .replace('\u{2019}', "'")
        .to_lowercase();
    GENDER_WORDS.contains(&bare.as_str())
}

pub(crate) fn strip_brand_prefix(text: &str, ctx: &StepContext<'_>) -> String {
    let Some(brand) = ctx.brand else {
        return text.to_string();
    };
    if brand.canonical_name == UNKNOWN_BRAND {
        return text.to_string();
    }

    let mut candidates: Vec<Vec<String>> = vec![fold_words(&brand.canonical_name)];
    if let Some(entry) = brand::entry_for(brand) {
        candidates.extend(entry.aliases.iter().map(|alias| fold_words(alias)));
        candidates.extend(entry.prefix_leaks.iter().map(|leak| fold_words(leak)));
    }
    let compact: String = candidates[0].concat();
    candidates.push(vec![compact]);
    candidates.retain(|words| !words.is_empty());
    candidates.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    loop {
        let folded: Vec<String> = tokens.iter().map(|token| fold_token(token)).collect();
        let matched = candidates.iter().find(|words| {
            words.len() < tokens.len()
                && words.iter().zip(folded.iter()).all(|(word, token)| word == token)
        });
        match matched {
            Some(words) => {
                tokens.drain(..words.len());
            }
            None => break,
        }
    }
    tokens.join(" ")
}

fn fold_words(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(fold_token)
        .filter(|word| !word.is_empty())
        .collect()
}

fn fold_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn brand_corrections(text: &str, ctx: &StepContext<'_>) -> String {
    let Some(rules) = ctx.brand_rules() else {
        return text.to_string();
    };
    let mut current = text.to_string();
    for (pattern, replacement) in &rules.corrections {
        current = pattern.replace_all(&current, replacement.as_str()).into_owned();
    }
    current
}

pub(crate) fn strip_rider_name(text: &str, ctx: &StepContext<'_>) -> String {
    let Some(rules) = ctx.brand_rules() else {
        return text.to_string();
    };
    let mut current = text.trim().to_string();
    for rider in &rules.riders {
        for pattern in [&rider.infix, &rider.prefix, &rider.suffix] {
            let candidate = pattern.replace(&current, " ");
            if candidate == current {
                continue;
            }
            let leftover = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
            if is_meaningful_model(&leftover) {
                current = leftover;
            }
        }
    }
    current
}

fn is_meaningful_model(value: &str) -> bool {
    let lowered = value.to_lowercase();
    !lowered.is_empty() && !GENERIC_LEFTOVERS.contains(&lowered.as_str())
}

pub(crate) fn relocate_shape_modifier(text: &str, ctx: &StepContext<'_>) -> String {
    let Some(rules) = ctx.brand_rules() else {
        return text.to_string();
    };
    if rules.shape_modifiers.is_empty() {
        return text.to_string();
    }
    let lowered = text.trim().to_lowercase();
    if rules
        .shape_protected
        .iter()
        .any(|protected| lowered.starts_with(protected.as_str()))
    {
        return text.to_string();
    }

    let mut tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if tokens.len() > 1 {
        let first = tokens[0].to_lowercase();
        if let Some(modifier) = rules.shape_modifiers.iter().find(|m| m.token == first) {
            tokens.remove(0);
            tokens.push(modifier.canonical.clone());
            return tokens.join(" ");
        }
    }
    if let Some(last) = tokens.last_mut() {
        let lowered_last = last.to_lowercase();
        if let Some(modifier) = rules.shape_modifiers.iter().find(|m| m.token == lowered_last) {
            *last = modifier.canonical.clone();
        }
    }
    tokens.join(" ")
}

pub(crate) fn normalize_dots(text: &str, _ctx: &StepContext<'_>) -> String {
    let collapsed = ACRONYM_DOTS.replace_all(text, |caps: &Captures<'_>| {
        format!("{}{}", caps[1].replace('.', ""), &caps[2])
    });
    let abbreviated = ABBREVIATION_DOT.replace_all(&collapsed, "${1}.${2}");
    abbreviated.trim_end().trim_end_matches('.').to_string()
}

pub(crate) fn hyphen_to_space(text: &str, _ctx: &StepContext<'_>) -> String {
    text.chars()
        .map(|c| match c {
            '-' | '\u{2010}' | '\u{2011}' | '\u{2013}' | '\u{2014}' => ' ',
            other => other,
        })
        .collect()
}

pub(crate) fn alias_lookup(text: &str, ctx: &StepContext<'_>) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    let lowered = collapsed.to_lowercase();
    let brand_rules = ctx.brand_rules();

    if let Some(canonical) = brand_rules.and_then(|rules| rules.aliases.get(&lowered)) {
        return canonical.clone();
    }
    if let Some(canonical) = ctx.rules.aliases.get(&lowered) {
        return canonical.clone();
    }
    if let Some(rules) = brand_rules {
        for (key, canonical) in &rules.alias_prefixes {
            let key_words = key.split_whitespace().count();
            if lowered.starts_with(key.as_str())
                && lowered[key.len()..].starts_with(' ')
                && words.len() > key_words
            {
                return format!("{} {}", canonical, words[key_words..].join(" "));
            }
        }
    }

    let has_upper = collapsed.chars().any(char::is_uppercase);
    if !has_upper && collapsed.chars().any(char::is_alphabetic) {
        return brand::title_case(&collapsed);
    }
    collapsed
}

pub(crate) fn strip_profile(text: &str, ctx: &StepContext<'_>) -> String {
    if ctx.options.keep_profile {
        return text.to_string();
    }
    let brand_rules = ctx.brand_rules();
    let mut tokens: Vec<&str> = text.split_whitespace().collect();

    loop {
        let lowered = tokens.join(" ").to_lowercase();
        if brand_rules.is_some_and(|rules| rules.profile_keep.contains(&lowered)) {
            break;
        }
        let designators = ctx
            .rules
            .profile_designators
            .iter()
            .chain(brand_rules.into_iter().flat_map(|rules| rules.profile_extra.iter()));
        let longest = designators
            .map(|designator| designator.split_whitespace().collect::<Vec<_>>())
            .filter(|words| words.len() < tokens.len() && ends_with_words(&tokens, words))
            .max_by_key(|words| words.len());
        match longest {
            Some(words) => tokens.truncate(tokens.len() - words.len()),
            None => break,
        }
    }
    tokens.join(" ")
}

fn ends_with_words(tokens: &[&str], words: &[&str]) -> bool {
    let offset = tokens.len() - words.len();
    tokens[offset..]
        .iter()
        .zip(words)
        .all(|(token, word)| token.to_lowercase() == *word)
}

pub(crate) fn final_cleanup(text: &str, _ctx: &StepContext<'_>) -> String {
    let without_brackets = EMPTY_BRACKETS.replace_all(text, " ");
    let collapsed = without_brackets.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c == '/' || c == '-' || c == '.' || c.is_whitespace())
        .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}
