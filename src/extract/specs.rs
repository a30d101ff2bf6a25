//! Specification mining and categorization
//!
//! Key/value pairs are collected from tables, keyword-named `div`s, `dt`/`dd`
//! pairs and JSON blobs embedded in scripts, then routed into a [`SpecBucket`]
//! by [`SpecClassifier`]. Independently, regex sweeps over the page text collect
//! measurements, material sentences, safety warnings and usage directions, each
//! capped at [`MINING_CAP`] entries.
//!
//! The structured `#prodDetails` expander tables, the detail-bullet list and the
//! "Directions" block of `#important-information` take precedence over mined
//! pairs for the buckets they cover (see [`resolve_specs`]).

use crate::extract::text::{
    body, char_len, next_element_sibling, sanitize_text, select_all, select_first, text_content, trimmed_text,
    visible_text,
};
use crate::models::{SpecBucket, SpecBuckets};
use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Upper bound on entries produced by each text sweep
pub const MINING_CAP: usize = 10;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("valid regex"))
        .collect()
}

const FEATURE_KEYS: [&str; 13] = [
    "feature",
    "special",
    "design",
    "style",
    "pattern",
    "capacity",
    "performance",
    "function",
    "technology",
    "battery",
    "power",
    "speed",
    "memory",
];

static ITEM_DETAIL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"product|details?|specifications?|info|about|description",
        r"model|brand|manufacturer|seller|vendor|company",
        r"package|contents|includes|contains|comprising",
        r"type|category|class|classification|series",
        r"version|edition|release|update|variant",
        r"certification|approved|tested|verified|compliant",
    ])
});

static MEASUREMENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"dimension|measurement|size|capacity|volume",
        r"weight|mass|density|load|pressure",
        r"length|width|height|depth|thickness|diameter",
        r"inch|cm|mm|ft|meter|pound|kg|oz|gram",
        r"area|square|cubic|ratio|proportion",
        r"temperature|degree|fahrenheit|celsius",
    ])
});

static MATERIAL_CARE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"material|fabric|textile|composition|made of|construction",
        r"care|wash|clean|maintain|dry|iron|bleach",
        r"instruction|guideline|direction|recommendation",
        r"cotton|polyester|wool|silk|leather|metal|wood",
        r"surface|finish|coating|treatment|processing",
        r"color|dye|paint|stain|shade|tone",
    ])
});

static ADDITIONAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"additional|extra|more|other|supplementary",
        r"note|tip|hint|suggestion|advice",
        r"benefit|advantage|feature|quality|trait",
        r"usage|application|purpose|function|utility",
        r"storage|shelf|life|duration|period",
    ])
});

static MEASUREMENT_SWEEPS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(\d+(?:\.\d+)?)\s*(inch|in|cm|mm|foot|ft|meter|m)\b",
        r"(\d+(?:\.\d+)?)\s*(pound|lb|ounce|oz|gram|g|kg)\b",
        r"(\d+(?:\.\d+)?)\s*x\s*(\d+(?:\.\d+)?)\s*x\s*(\d+(?:\.\d+)?)",
        r"weight:?\s*(\d+(?:\.\d+)?\s*(?:pound|lb|ounce|oz|gram|g|kg))",
        r"dimensions?:?\s*([\d\.\s×x]+)",
    ])
});

static SCRIPT_BLOBS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#""productDetails"\s*:\s*\{([^}]+)\}"#,
        r#""specifications"\s*:\s*\{([^}]+)\}"#,
        r#""attributes"\s*:\s*\{([^}]+)\}"#,
        r#""features"\s*:\s*\[([^\]]+)\]"#,
        r#""dimensions"\s*:\s*\{([^}]+)\}"#,
        r#""materials"\s*:\s*\{([^}]+)\}"#,
    ])
});

static SCRIPT_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"\s*:\s*"([^"]+)""#).expect("valid regex"));
static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]").expect("valid regex"));
static KEY_NOISE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[:\n\r\t]+").expect("valid regex"));
static ALL_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static BULLET_KEY_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[:\\s\u{200f}\u{200e}]+$").expect("valid regex"));
static RANK_ENTRY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#[\d,]+\s+in\s+[^(]+").expect("valid regex"));
static STARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s+out of \d+ stars").expect("valid regex"));
static PAREN_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d+)\)").expect("valid regex"));

const MATERIAL_KEYS: [&str; 16] = [
    "cotton",
    "polyester",
    "wool",
    "silk",
    "leather",
    "plastic",
    "metal",
    "wood",
    "glass",
    "ceramic",
    "rubber",
    "fabric",
    "material",
    "made of",
    "constructed",
    "finish",
];

const SAFETY_KEYS: [&str; 8] = [
    "warning",
    "caution",
    "safety",
    "hazard",
    "danger",
    "not suitable",
    "choking",
    "age restriction",
];

const DIRECTION_KEYS: [&str; 7] = [
    "instruction",
    "direction",
    "how to",
    "usage",
    "assembly",
    "setup",
    "installation",
];

const SPEC_DIV_KEYWORDS: [&str; 7] = ["detail", "spec", "feature", "bullet", "info", "attribute", "prop"];

/// Routes a key/value pair into a bucket.
///
/// Rules run in a fixed order and the first hit wins: feature keywords in the
/// key, then item-detail, measurement, materials/care and additional-detail
/// patterns tested against key and value. Pairs matching nothing go to
/// `fallback`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecClassifier {
    pub fallback: SpecBucket,
}

impl Default for SpecClassifier {
    fn default() -> Self {
        Self {
            fallback: SpecBucket::ItemDetails,
        }
    }
}

impl SpecClassifier {
    pub fn with_fallback(fallback: SpecBucket) -> Self {
        Self { fallback }
    }

    pub fn classify(&self, key: &str, value: &str) -> SpecBucket {
        let lower_key = key.to_lowercase();
        let matches_any = |patterns: &[Regex]| patterns.iter().any(|p| p.is_match(&lower_key) || p.is_match(value));

        if FEATURE_KEYS.iter().any(|k| lower_key.contains(k)) {
            SpecBucket::FeaturesSpecs
        } else if matches_any(ITEM_DETAIL_PATTERNS.as_slice()) {
            SpecBucket::ItemDetails
        } else if matches_any(MEASUREMENT_PATTERNS.as_slice()) {
            SpecBucket::Measurements
        } else if matches_any(MATERIAL_CARE_PATTERNS.as_slice()) {
            SpecBucket::MaterialsCare
        } else if matches_any(ADDITIONAL_PATTERNS.as_slice()) {
            SpecBucket::AdditionalDetails
        } else {
            self.fallback
        }
    }

    fn store(&self, specs: &mut SpecBuckets, key: &str, value: &str) {
        let bucket = self.classify(key, value);
        specs.insert(bucket, key, value);
    }
}

/// Mine every structural and textual source on the page into buckets
pub fn mine_specs(document: &Html, classifier: &SpecClassifier) -> SpecBuckets {
    let mut specs = SpecBuckets::default();
    let root = document.root_element();

    mine_tables(root, classifier, &mut specs);
    mine_keyword_divs(root, classifier, &mut specs);
    mine_definition_lists(root, classifier, &mut specs);

    let page_text = visible_text(body(document));
    sweep_measurements(&page_text, &mut specs);
    sweep_materials(&page_text, &mut specs);
    sweep_safety_and_directions(&page_text, &mut specs);

    mine_scripts(root, classifier, &mut specs);
    specs
}

/// Mined buckets with the structured sections laid over them.
///
/// A structured section that is present and non-empty replaces the mined bucket;
/// otherwise the mined pairs are kept.
pub fn resolve_specs(document: &Html, classifier: &SpecClassifier) -> SpecBuckets {
    let mut specs = mine_specs(document, classifier);

    let item_details = {
        let section = prod_details_section(document, |h| h == "item details");
        if section.is_empty() { detail_bullets(document) } else { section }
    };
    override_if_present(&mut specs.item_details, item_details);
    override_if_present(&mut specs.measurements, prod_details_section(document, |h| h == "measurements"));
    override_if_present(
        &mut specs.features_specs,
        prod_details_section(document, |h| h == "features & specs"),
    );
    override_if_present(
        &mut specs.additional_details,
        prod_details_section(document, |h| h.contains("additional details")),
    );

    let directions = directions_section(document);
    if !directions.is_empty() {
        specs.directions = directions;
    }

    specs
}

fn override_if_present(target: &mut IndexMap<String, String>, section: IndexMap<String, String>) {
    if !section.is_empty() {
        *target = section;
    }
}

fn mine_tables(root: ElementRef<'_>, classifier: &SpecClassifier, specs: &mut SpecBuckets) {
    for table in select_all(root, "table") {
        for row in select_all(table, "tr") {
            let cells = select_all(row, "td, th");
            if cells.len() < 2 {
                continue;
            }

            let raw_key = text_content(cells[0]).trim().to_string();
            let raw_value = text_content(cells[1]).trim().to_string();
            if raw_key.is_empty() || raw_value.is_empty() || char_len(&raw_key) > 150 {
                continue;
            }

            let key = KEY_NOISE.replace_all(&raw_key, " ").trim().to_string();
            let value = KEY_NOISE.replace_all(&raw_value, " ").trim().to_string();

            if key.is_empty() || key.to_lowercase() == value.to_lowercase() || ALL_DIGITS.is_match(&key) {
                continue;
            }

            classifier.store(specs, &key, &value);
        }
    }
}

/// Split "Key: value" text on its first colon
fn split_pair(text: &str) -> Option<(String, String)> {
    if !text.contains(':') || char_len(text) >= 300 {
        return None;
    }

    let (key, value) = text.split_once(':')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() || value.is_empty() || char_len(key) >= 100 {
        return None;
    }

    Some((key.to_string(), value.to_string()))
}

fn mine_keyword_divs(root: ElementRef<'_>, classifier: &SpecClassifier, specs: &mut SpecBuckets) {
    let mut visited = HashSet::new();

    for keyword in SPEC_DIV_KEYWORDS {
        let css = format!(r#"div[id*="{0}"], div[class*="{0}"]"#, keyword);

        for div in select_all(root, &css) {
            if !visited.insert(div.id()) {
                continue;
            }

            for line in text_content(div).split('\n') {
                if let Some((key, value)) = split_pair(line) {
                    classifier.store(specs, &key, &value);
                }
            }

            for item in select_all(div, "span, li, p, div") {
                let text = text_content(item);
                if let Some((key, value)) = split_pair(text.trim()) {
                    classifier.store(specs, &key, &value);
                }
            }
        }
    }
}

fn mine_definition_lists(root: ElementRef<'_>, classifier: &SpecClassifier, specs: &mut SpecBuckets) {
    for dt in select_all(root, "dt") {
        let Some(dd) = next_element_sibling(dt).filter(|el| el.value().name() == "dd") else {
            continue;
        };

        if let (Some(key), Some(value)) = (trimmed_text(dt), trimmed_text(dd)) {
            classifier.store(specs, &key, &value);
        }
    }
}

fn mine_scripts(root: ElementRef<'_>, classifier: &SpecClassifier, specs: &mut SpecBuckets) {
    for script in select_all(root, "script") {
        let source = text_content(script);
        if source.is_empty() {
            continue;
        }

        for blob_pattern in SCRIPT_BLOBS.iter() {
            for blob in blob_pattern.captures_iter(&source) {
                for pair in SCRIPT_PAIR.captures_iter(&blob[1]) {
                    classifier.store(specs, &pair[1], &pair[2]);
                }
            }
        }
    }
}

fn sweep_measurements(text: &str, specs: &mut SpecBuckets) {
    let mut found = 0;

    for pattern in MEASUREMENT_SWEEPS.iter() {
        for hit in pattern.find_iter(text) {
            if found >= MINING_CAP {
                return;
            }
            found += 1;
            specs.insert(SpecBucket::Measurements, format!("Measurement_{}", found), hit.as_str());
        }
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE_BREAK.split(text)
}

fn sweep_materials(text: &str, specs: &mut SpecBuckets) {
    let mut found = 0;

    for key in MATERIAL_KEYS {
        if found >= MINING_CAP {
            break;
        }

        let hit = sentences(text).find(|s| char_len(s) < 200 && s.to_lowercase().contains(key));
        if let Some(sentence) = hit {
            specs.insert(SpecBucket::MaterialsCare, format!("Material_info_{}", key), sanitize_text(sentence));
            found += 1;
        }
    }
}

fn sweep_safety_and_directions(text: &str, specs: &mut SpecBuckets) {
    for sentence in sentences(text) {
        let sentence = sentence.trim();
        let len = char_len(sentence);
        if len <= 10 || len >= 300 {
            continue;
        }

        let lower = sentence.to_lowercase();
        if specs.safety_info.len() < MINING_CAP && SAFETY_KEYS.iter().any(|k| lower.contains(k)) {
            specs.safety_info.push(sanitize_text(sentence));
        }
        if specs.directions.len() < MINING_CAP && DIRECTION_KEYS.iter().any(|k| lower.contains(k)) {
            specs.directions.push(sanitize_text(sentence));
        }
    }
}

/// Rows of the `#prodDetails` expander whose prompt satisfies `heading`
/// (compared trimmed and lowercased)
pub fn prod_details_section(document: &Html, heading: impl Fn(&str) -> bool) -> IndexMap<String, String> {
    let mut rows = IndexMap::new();

    let Some(prod_details) = select_first(document.root_element(), "#prodDetails") else {
        return rows;
    };

    for container in select_all(prod_details, "div.a-expander-container") {
        let matches = select_first(container, "span.a-expander-prompt")
            .map(|prompt| heading(&text_content(prompt).trim().to_lowercase()))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if let Some(table) = select_first(container, "table.prodDetTable") {
            for row in select_all(table, "tr") {
                let key = select_first(row, "th").and_then(trimmed_text);
                let value = select_first(row, "td").and_then(trimmed_text);
                if let (Some(key), Some(value)) = (key, value) {
                    rows.insert(key, value);
                }
            }
        }
        break;
    }

    rows
}

/// Key/value pairs of the detail-bullet list (`#detailBulletsWrapper_feature_div`)
pub fn detail_bullets(document: &Html) -> IndexMap<String, String> {
    let mut details = IndexMap::new();

    let Some(section) = select_first(document.root_element(), "#detailBulletsWrapper_feature_div") else {
        return details;
    };

    for item in select_all(section, "ul.detail-bullet-list li") {
        let Some(bold) = select_first(item, "span.a-text-bold") else {
            continue;
        };

        let bold_text = text_content(bold);
        let key = BULLET_KEY_TAIL.replace(&bold_text, "").trim().to_string();
        let item_text = text_content(item).trim().to_string();
        let mut value = item_text.replacen(bold_text.trim(), "", 1).trim().to_string();

        let lower_key = key.to_lowercase();
        if lower_key.contains("best sellers rank") {
            let ranks: Vec<_> = RANK_ENTRY.find_iter(&item_text).map(|m| m.as_str().trim()).collect();
            if !ranks.is_empty() {
                value = ranks.join(", ");
            }
        } else if lower_key.contains("customer reviews") {
            let rating = STARS.captures(&item_text);
            let count = PAREN_COUNT.captures(&item_text);
            if let (Some(rating), Some(count)) = (rating, count) {
                value = format!("{} out of 5 stars ({} reviews)", &rating[1], &count[1]);
            }
        }

        if !key.is_empty() && !value.is_empty() {
            details.insert(key, value);
        }
    }

    details
}

/// Paragraphs of the "Directions" block inside `#important-information`
pub fn directions_section(document: &Html) -> Vec<String> {
    let Some(info) = select_first(document.root_element(), "#important-information") else {
        return Vec::new();
    };

    for section in select_all(info, "div.a-section.content") {
        let is_directions = select_all(section, "span.a-text-bold, h1, h2, h3, h4, h5, h6, strong, b")
            .into_iter()
            .any(|header| text_content(header).trim().eq_ignore_ascii_case("directions"));

        if is_directions {
            return select_all(section, "p")
                .into_iter()
                .filter_map(trimmed_text)
                .map(|t| sanitize_text(&t))
                .collect();
        }
    }

    Vec::new()
}
