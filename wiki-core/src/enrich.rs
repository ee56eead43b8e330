//! Metadata enricher (C5): deterministic temporal/spatial/typological/
//! trust classification. Every classifier is a pure function over
//! (text, structural metadata, a fixed table) — no shared state, no
//! clock, no randomness — so re-running on identical inputs is
//! byte-identical, per the pipeline's determinism requirement.

use crate::model::{
    Chunk, ChunkMetadata, CleanedPage, ContentType, EnrichedMetadata, InfoSource, KnowledgeTier,
    ProcessingStats, TimePeriod,
};
use crate::chunker::RawChunk;
use regex::Regex;
use std::sync::OnceLock;

const MIN_YEAR: i32 = 1950;
const MAX_YEAR: i32 = 2290;
const WAR_YEAR: i32 = 2077;

/// Context words that mark a nearby 4-digit number as a real-world date
/// (developer commentary, publication notes) rather than in-universe
/// lore. Checked case-insensitively within a small window around the
/// match.
const NON_YEAR_CONTEXT_MARKERS: &[&str] = &[
    "developer",
    "interview",
    "real world",
    "real-world",
    "released",
    "release date",
    "patch notes",
    "behind the scenes",
    "published",
];

const NON_YEAR_SECTION_TITLES: &[&str] = &["behind the scenes", "trivia", "development"];

/// (keyword, canonical location); first match in priority order wins.
const LOCATION_KEYWORDS: &[(&str, &str)] = &[
    ("mojave", "Mojave Wasteland"),
    ("new vegas", "Mojave Wasteland"),
    ("capital wasteland", "Capital Wasteland"),
    ("washington d.c.", "Capital Wasteland"),
    ("commonwealth", "Commonwealth"),
    ("boston", "Commonwealth"),
    ("appalachia", "Appalachia"),
    ("west virginia", "Appalachia"),
    ("california", "California"),
    ("vault 13", "California"),
];

/// Many-to-one location -> region table.
const REGION_TABLE: &[(&str, &str)] = &[
    ("California", "West Coast"),
    ("Mojave Wasteland", "West Coast"),
    ("Capital Wasteland", "East Coast"),
    ("Commonwealth", "East Coast"),
    ("Appalachia", "Appalachia"),
];

const SPATIAL_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// (infobox-type substring, content type); checked before category and
/// keyword fallbacks.
const INFOBOX_CONTENT_TYPES: &[(&str, ContentType)] = &[
    ("character", ContentType::Character),
    ("vault", ContentType::Location),
    ("location", ContentType::Location),
    ("faction", ContentType::Faction),
    ("event", ContentType::Event),
    ("weapon", ContentType::Item),
    ("item", ContentType::Item),
    ("technology", ContentType::Technology),
    ("robot", ContentType::Technology),
    ("creature", ContentType::Creature),
    ("quest", ContentType::Quest),
];

const CATEGORY_CONTENT_TYPES: &[(&str, ContentType)] = &[
    ("characters", ContentType::Character),
    ("locations", ContentType::Location),
    ("vaults", ContentType::Location),
    ("factions", ContentType::Faction),
    ("events", ContentType::Event),
    ("items", ContentType::Item),
    ("weapons", ContentType::Item),
    ("technology", ContentType::Technology),
    ("creatures", ContentType::Creature),
    ("quests", ContentType::Quest),
];

struct Regexes {
    year: Regex,
}

fn regexes() -> &'static Regexes {
    static REGEXES: OnceLock<Regexes> = OnceLock::new();
    REGEXES.get_or_init(|| Regexes {
        year: Regex::new(r"([A-Za-z])?-?\b(\d{4})\b").unwrap(),
    })
}

pub fn enrich(raw: RawChunk, page: &CleanedPage, stats: &ProcessingStats) -> Chunk {
    let mut haystacks: Vec<&str> = vec![raw.text.as_str()];
    for t in &page.templates {
        for (_, v) in &t.parameters {
            haystacks.push(v.as_str());
        }
    }
    for i in &page.infoboxes {
        for (_, v) in &i.parameters {
            haystacks.push(v.as_str());
        }
    }

    let years = extract_years(&haystacks);
    let (time_period, year_min, year_max, is_pre_war, is_post_war, temporal_confidence) =
        classify_temporal(&years);

    let (location, region_type, spatial_confidence) = classify_spatial(page, &raw.text);
    if location.is_none() {
        // No spatial signal cleared SPATIAL_CONFIDENCE_THRESHOLD; per
        // spec the chunk's location stays null rather than "general",
        // but the run still needs to know how often that happened.
        stats.inc_spatial_unknown();
    }
    let (content_type, content_type_confidence) = classify_content_type(page, &raw.text);
    let (knowledge_tier, info_source, knowledge_tier_confidence) = classify_tier_and_source(page);

    let enriched = EnrichedMetadata {
        time_period,
        year_min,
        year_max,
        is_pre_war,
        is_post_war,
        location,
        region_type,
        content_type,
        knowledge_tier,
        info_source,
        temporal_confidence,
        spatial_confidence,
        content_type_confidence,
        knowledge_tier_confidence,
    };

    let id = Chunk::make_id(&raw.structural.wiki_title, raw.chunk_index, &raw.text);
    Chunk {
        id,
        text: raw.text,
        chunk_index: raw.chunk_index,
        metadata: ChunkMetadata {
            structural: raw.structural,
            enriched,
        },
    }
}

fn extract_years(haystacks: &[&str]) -> Vec<i32> {
    let re = &regexes().year;
    let mut years = Vec::new();
    for haystack in haystacks {
        for caps in re.captures_iter(haystack) {
            if caps.get(1).is_some() {
                // Preceded by a letter and a hyphen: a character/item id
                // like "A-2018", not a year.
                continue;
            }
            let m = caps.get(2).unwrap();
            let Ok(year) = m.as_str().parse::<i32>() else {
                continue;
            };
            if year < MIN_YEAR || year > MAX_YEAR {
                continue;
            }
            if has_non_year_context(haystack, m.start(), m.end()) {
                continue;
            }
            years.push(year);
        }
    }
    years
}

fn has_non_year_context(text: &str, start: usize, end: usize) -> bool {
    const RADIUS: usize = 40;
    let window_start = safe_floor_boundary(text, start.saturating_sub(RADIUS));
    let window_end = safe_ceil_boundary(text, (end + RADIUS).min(text.len()));
    let window = text[window_start..window_end].to_lowercase();
    NON_YEAR_CONTEXT_MARKERS.iter().any(|m| window.contains(m))
}

fn safe_floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn safe_ceil_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn classify_temporal(
    years: &[i32],
) -> (Option<TimePeriod>, Option<i32>, Option<i32>, bool, bool, f32) {
    if years.is_empty() {
        return (None, None, None, false, false, 0.0);
    }
    let year_min = *years.iter().min().unwrap();
    let year_max = *years.iter().max().unwrap();
    let is_pre_war = year_max < WAR_YEAR;
    let is_post_war = year_min > WAR_YEAR;
    let period = TimePeriod::from_year(year_max);
    (Some(period), Some(year_min), Some(year_max), is_pre_war, is_post_war, 0.9)
}

fn classify_spatial(page: &CleanedPage, text: &str) -> (Option<String>, Option<String>, f32) {
    // Categories and wikilink targets outrank free-text matches.
    let structured: Vec<String> = page
        .categories
        .iter()
        .cloned()
        .chain(page.wikilinks.iter().map(|l| l.target.clone()))
        .collect();

    let mut best: Option<(&'static str, f32)> = None;
    for candidate in &structured {
        if let Some(location) = match_location(candidate) {
            best = Some((location, 0.9));
            break;
        }
    }
    if best.is_none() {
        let lowered = text.to_lowercase();
        for (keyword, location) in LOCATION_KEYWORDS {
            if lowered.contains(keyword) {
                best = Some((location, 0.5));
                break;
            }
        }
    }

    match best {
        Some((location, confidence)) if confidence >= SPATIAL_CONFIDENCE_THRESHOLD => {
            let region = REGION_TABLE
                .iter()
                .find(|(loc, _)| *loc == location)
                .map(|(_, region)| region.to_string());
            (Some(location.to_string()), region, confidence)
        }
        _ => (None, None, 0.0),
    }
}

fn match_location(candidate: &str) -> Option<&'static str> {
    let lowered = candidate.to_lowercase();
    LOCATION_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, location)| *location)
}

fn classify_content_type(page: &CleanedPage, text: &str) -> (ContentType, f32) {
    for infobox in &page.infoboxes {
        let lowered = infobox.type_name.to_lowercase();
        if let Some((_, ct)) = INFOBOX_CONTENT_TYPES.iter().find(|(k, _)| lowered.contains(k)) {
            return (*ct, 0.9);
        }
    }
    for category in &page.categories {
        let lowered = category.to_lowercase();
        if let Some((_, ct)) = CATEGORY_CONTENT_TYPES.iter().find(|(k, _)| lowered.contains(k)) {
            return (*ct, 0.7);
        }
    }
    let lowered = text.to_lowercase();
    for (keyword, ct) in CATEGORY_CONTENT_TYPES {
        if lowered.contains(keyword) {
            return (*ct, 0.3);
        }
    }
    (ContentType::Other, 0.0)
}

fn classify_tier_and_source(page: &CleanedPage) -> (KnowledgeTier, InfoSource, f32) {
    let infobox_names: Vec<String> = page.infoboxes.iter().map(|i| i.type_name.to_lowercase()).collect();
    let categories: Vec<String> = page.categories.iter().map(|c| c.to_lowercase()).collect();

    if infobox_names.iter().any(|n| n.contains("vault")) {
        let tier = if infobox_names.iter().any(|n| n.contains("experiment")) {
            KnowledgeTier::Classified
        } else {
            KnowledgeTier::Common
        };
        return (tier, InfoSource::VaultTec, 0.9);
    }
    if infobox_names.iter().any(|n| n.contains("military"))
        || categories.iter().any(|c| c.contains("military"))
    {
        return (KnowledgeTier::Regional, InfoSource::Military, 0.7);
    }
    if infobox_names.iter().any(|n| n.contains("corporation") || n.contains("company"))
        || categories.iter().any(|c| c.contains("corporation"))
    {
        return (KnowledgeTier::Regional, InfoSource::Corporate, 0.7);
    }
    if infobox_names.iter().any(|n| n.contains("faction"))
        || categories.iter().any(|c| c.contains("faction"))
    {
        return (KnowledgeTier::Regional, InfoSource::Faction, 0.6);
    }
    (KnowledgeTier::Common, InfoSource::Public, 0.3)
}
