use serde::{Deserialize, Serialize};

/// Named era bucket, derived from the min/max accepted years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimePeriod {
    PreWar,
    Era2077To2102,
    Era2103To2160,
    Era2161To2240,
    Era2241To2286,
    Era2287Plus,
}

impl TimePeriod {
    /// Bucket a single accepted year into its era. Callers classifying a
    /// chunk that spans multiple eras should call this per year and take
    /// the bucket(s) relevant to `year_min`/`year_max`.
    pub fn from_year(year: i32) -> Self {
        match year {
            y if y < 2077 => TimePeriod::PreWar,
            2077..=2102 => TimePeriod::Era2077To2102,
            2103..=2160 => TimePeriod::Era2103To2160,
            2161..=2240 => TimePeriod::Era2161To2240,
            2241..=2286 => TimePeriod::Era2241To2286,
            _ => TimePeriod::Era2287Plus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::PreWar => "pre-war",
            TimePeriod::Era2077To2102 => "2077-2102",
            TimePeriod::Era2103To2160 => "2103-2160",
            TimePeriod::Era2161To2240 => "2161-2240",
            TimePeriod::Era2241To2286 => "2241-2286",
            TimePeriod::Era2287Plus => "2287+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Character,
    Location,
    Faction,
    Event,
    Item,
    Technology,
    Creature,
    Quest,
    Lore,
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Character => "character",
            ContentType::Location => "location",
            ContentType::Faction => "faction",
            ContentType::Event => "event",
            ContentType::Item => "item",
            ContentType::Technology => "technology",
            ContentType::Creature => "creature",
            ContentType::Quest => "quest",
            ContentType::Lore => "lore",
            ContentType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeTier {
    Common,
    Regional,
    Classified,
    Restricted,
}

impl KnowledgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeTier::Common => "common",
            KnowledgeTier::Regional => "regional",
            KnowledgeTier::Classified => "classified",
            KnowledgeTier::Restricted => "restricted",
        }
    }

    /// Parse the flattened string form back into a tier; used by the
    /// query facade (C8) to compare a stored record against a persona's
    /// `max_knowledge_tier`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(KnowledgeTier::Common),
            "regional" => Some(KnowledgeTier::Regional),
            "classified" => Some(KnowledgeTier::Classified),
            "restricted" => Some(KnowledgeTier::Restricted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfoSource {
    Public,
    Military,
    Corporate,
    VaultTec,
    Faction,
}

impl InfoSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoSource::Public => "public",
            InfoSource::Military => "military",
            InfoSource::Corporate => "corporate",
            InfoSource::VaultTec => "vault-tec",
            InfoSource::Faction => "faction",
        }
    }
}

/// Deterministic temporal/spatial/typological/trust labels for a chunk
/// (C5 output). Every field that can be computed from an explicit rule
/// carries a `confidence` in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedMetadata {
    pub time_period: Option<TimePeriod>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub is_pre_war: bool,
    pub is_post_war: bool,
    pub location: Option<String>,
    pub region_type: Option<String>,
    pub content_type: ContentType,
    pub knowledge_tier: KnowledgeTier,
    pub info_source: InfoSource,
    pub temporal_confidence: f32,
    pub spatial_confidence: f32,
    pub content_type_confidence: f32,
    pub knowledge_tier_confidence: f32,
}
