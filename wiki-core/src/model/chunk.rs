use super::enriched::EnrichedMetadata;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Non-text metadata carried alongside a chunk's text, derived purely
/// from the page's structure (C3 output projected onto one chunk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralMetadata {
    pub wiki_title: String,
    pub section_title: String,
    pub section_path: String,
    pub section_level: u8,
    pub categories: Vec<String>,
    pub wikilink_targets: Vec<String>,
    pub infobox_types: Vec<String>,
    pub game_refs: Vec<String>,
    pub chunk_index: usize,
}

/// Both sub-parts are required; neither is optional once a chunk exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub structural: StructuralMetadata,
    pub enriched: EnrichedMetadata,
}

/// A scalar value in the store's flat metadata mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlatValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ChunkMetadata {
    /// The single source of truth for flattening: nested records expand
    /// to `parent_child` keys, lists become comma-joined strings plus a
    /// sibling `<name>_count` integer, and `None`/empty-optional values
    /// are dropped entirely rather than stored as null.
    pub fn to_flat(&self) -> BTreeMap<String, FlatValue> {
        let mut flat = BTreeMap::new();
        let s = &self.structural;
        let e = &self.enriched;

        flat.insert("wiki_title".into(), FlatValue::String(s.wiki_title.clone()));
        flat.insert(
            "chunk_index".into(),
            FlatValue::Int(s.chunk_index as i64),
        );
        flat.insert(
            "section_title".into(),
            FlatValue::String(s.section_title.clone()),
        );
        flat.insert(
            "section_level".into(),
            FlatValue::Int(s.section_level as i64),
        );
        flat.insert(
            "section_path".into(),
            FlatValue::String(s.section_path.clone()),
        );

        insert_list(&mut flat, "categories", "category_count", &s.categories);
        insert_list(&mut flat, "wikilink_targets", "wikilink_count", &s.wikilink_targets);
        insert_list(&mut flat, "infobox_types", "infobox_count", &s.infobox_types);
        insert_list(&mut flat, "game_refs", "game_ref_count", &s.game_refs);

        if let Some(period) = e.time_period {
            flat.insert(
                "time_period".into(),
                FlatValue::String(period.as_str().to_string()),
            );
        }
        if let Some(y) = e.year_min {
            flat.insert("year_min".into(), FlatValue::Int(y as i64));
        }
        if let Some(y) = e.year_max {
            flat.insert("year_max".into(), FlatValue::Int(y as i64));
        }
        flat.insert("is_pre_war".into(), FlatValue::Bool(e.is_pre_war));
        flat.insert("is_post_war".into(), FlatValue::Bool(e.is_post_war));
        if let Some(loc) = &e.location {
            flat.insert("location".into(), FlatValue::String(loc.clone()));
        }
        if let Some(region) = &e.region_type {
            flat.insert("region_type".into(), FlatValue::String(region.clone()));
        }
        flat.insert(
            "content_type".into(),
            FlatValue::String(e.content_type.as_str().to_string()),
        );
        flat.insert(
            "knowledge_tier".into(),
            FlatValue::String(e.knowledge_tier.as_str().to_string()),
        );
        flat.insert(
            "info_source".into(),
            FlatValue::String(e.info_source.as_str().to_string()),
        );
        flat.insert(
            "temporal_confidence".into(),
            FlatValue::Float(e.temporal_confidence as f64),
        );
        flat.insert(
            "spatial_confidence".into(),
            FlatValue::Float(e.spatial_confidence as f64),
        );
        flat.insert(
            "content_type_confidence".into(),
            FlatValue::Float(e.content_type_confidence as f64),
        );
        flat.insert(
            "knowledge_tier_confidence".into(),
            FlatValue::Float(e.knowledge_tier_confidence as f64),
        );

        flat
    }
}

fn insert_list(flat: &mut BTreeMap<String, FlatValue>, name: &str, count_name: &str, items: &[String]) {
    flat.insert(count_name.to_string(), FlatValue::Int(items.len() as i64));
    if !items.is_empty() {
        flat.insert(name.to_string(), FlatValue::String(items.join(",")));
    }
}

/// Unit of retrieval (C4/C5 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Deterministic id: a hash of title + chunk_index + text. Stable
    /// across runs so re-ingestion upserts rather than duplicates.
    pub fn make_id(title: &str, chunk_index: usize, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"\0");
        hasher.update(chunk_index.to_le_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        hex_encode(&digest)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// What the vector store receives: an id, the source text, its
/// embedding, and a flat metadata mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: BTreeMap<String, FlatValue>,
}

impl StoreRecord {
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            document: chunk.text.clone(),
            embedding,
            metadata: chunk.metadata.to_flat(),
        }
    }
}
